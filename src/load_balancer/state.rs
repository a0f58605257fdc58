use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueList, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::LoadBalancer;
use crate::utils::{
    data_source_block, list_data_source_schema, set_strings, string_or_null, string_set,
    string_value, WithSchema, WithValidate,
};

pub const VIRTUAL_MACHINES: &str = "virtual_machines";
pub const VIRTUAL_MACHINE_GROUPS: &str = "virtual_machine_groups";
pub const TAGS: &str = "tags";

/// Target attributes with the resource type they select
const TARGETS: [(&str, &str); 3] = [
    ("virtual_machine_ids", VIRTUAL_MACHINES),
    ("virtual_machine_group_ids", VIRTUAL_MACHINE_GROUPS),
    ("tag_ids", TAGS),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancerState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub resource_type: ValueString<'a>,
    pub virtual_machine_ids: ValueSet<ValueString<'a>>,
    pub virtual_machine_group_ids: ValueSet<ValueString<'a>>,
    pub tag_ids: ValueSet<ValueString<'a>>,
    pub ip_address: ValueString<'a>,
    pub https_redirect: ValueBool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancersState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub load_balancers: ValueList<Value<LoadBalancerState<'a>>>,
}

fn target_set(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::Set(AttributeType::String.into()),
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    }
}

lazy_static! {
    static ref ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the load balancer"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "name" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Name of the load balancer, generated if not set"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "resource_type" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(
                "Kind of targets: `virtual_machines`, `virtual_machine_groups` or `tags`",
            ),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "virtual_machine_ids" => target_set("Virtual machines to balance the traffic to"),
        "virtual_machine_group_ids" => target_set("Virtual machine groups to balance the traffic to"),
        "tag_ids" => target_set("Tags of the virtual machines to balance the traffic to"),
        "ip_address" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("IP address of the load balancer"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "https_redirect" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain("Whether HTTP traffic is redirected to HTTPS"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
    };
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: ATTRIBUTES.clone(),
        description: Description::plain("Katapult load balancer"),
        ..Default::default()
    };
}

impl WithSchema for LoadBalancerState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithSchema for LoadBalancersState<'_> {
    fn schema() -> Schema {
        list_data_source_schema(
            "load_balancers",
            &BLOCK,
            "Load balancers of the organization",
        )
    }
}

impl WithValidate for LoadBalancerState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let set = TARGETS
            .iter()
            .zip(self.targets())
            .filter(|(_, values)| !values.is_null())
            .map(|((name, _), _)| *name)
            .collect::<Vec<_>>();
        if set.len() > 1 {
            diags.error(
                "Conflicting load balancer targets",
                format!(
                    "Only one of `virtual_machine_ids`, `virtual_machine_group_ids` and `tag_ids` can be set, got: {}",
                    set.join(", ")
                ),
                attr_path.attribute(set[1]),
            );
        }
    }
}

impl<'a> LoadBalancerState<'a> {
    pub fn data_source_schema() -> Schema {
        let mut block = data_source_block(&BLOCK, &[]);
        if let Some(id) = block.attributes.get_mut("id") {
            id.constraint = AttributeConstraint::Required;
        }
        Schema { version: 1, block }
    }

    fn targets(&self) -> [&ValueSet<ValueString<'a>>; 3] {
        [
            &self.virtual_machine_ids,
            &self.virtual_machine_group_ids,
            &self.tag_ids,
        ]
    }

    /// Resource type and ids of the configured targets, virtual machines when none is set
    pub fn resource_type_and_ids(&self) -> (String, Vec<String>) {
        TARGETS
            .iter()
            .zip(self.targets())
            .find(|(_, values)| values.is_value())
            .map(|((_, resource_type), values)| ((*resource_type).to_owned(), set_strings(values)))
            .unwrap_or_else(|| (VIRTUAL_MACHINES.to_owned(), Vec::new()))
    }

    pub fn targets_changed(&self, other: &Self) -> bool {
        self.targets() != other.targets()
    }

    /// Computed attributes are unknown until the load balancer exists
    pub fn mark_computed_unknown(&mut self) {
        self.id = Value::Unknown;
        self.ip_address = Value::Unknown;
        self.https_redirect = Value::Unknown;
        if self.name.is_null() {
            self.name = Value::Unknown;
        }
        self.resource_type = Value::Value(self.resource_type_and_ids().0.into());
    }
}

impl From<LoadBalancer> for LoadBalancerState<'_> {
    fn from(lb: LoadBalancer) -> Self {
        let mut state = Self {
            id: string_value(lb.id),
            name: string_value(lb.name),
            resource_type: string_value(lb.resource_type.clone()),
            ip_address: lb
                .ip_address
                .map_or(Value::Null, |ip| string_or_null(ip.address)),
            https_redirect: Value::Value(lb.https_redirect),
            ..Default::default()
        };
        if lb.resource_ids.is_empty() {
            return state;
        }
        let ids = string_set(lb.resource_ids);
        match lb.resource_type.as_str() {
            VIRTUAL_MACHINE_GROUPS => state.virtual_machine_group_ids = ids,
            TAGS => state.tag_ids = ids,
            _ => state.virtual_machine_ids = ids,
        }
        state
    }
}
