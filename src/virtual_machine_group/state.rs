use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueList, ValueString};
use tf_provider::map;

use crate::api::{VirtualMachineGroup, VirtualMachineGroupArguments};
use crate::utils::{bool_or, data_source_block, list_data_source_schema, string_value, WithSchema};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VirtualMachineGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub segregate: ValueBool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VirtualMachineGroupsState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub groups: ValueList<Value<VirtualMachineGroupState<'a>>>,
}

lazy_static! {
    static ref ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the virtual machine group"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "name" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Name of the virtual machine group"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "segregate" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain(
                "Spread the virtual machines of the group across different hosts (default: true)",
            ),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
    };
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: ATTRIBUTES.clone(),
        description: Description::plain("Katapult virtual machine group"),
        ..Default::default()
    };
}

impl WithSchema for VirtualMachineGroupState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl VirtualMachineGroupState<'_> {
    pub fn data_source_schema() -> Schema {
        let mut block = data_source_block(&BLOCK, &[]);
        if let Some(id) = block.attributes.get_mut("id") {
            id.constraint = AttributeConstraint::Required;
        }
        Schema { version: 1, block }
    }

    pub fn arguments(&self) -> VirtualMachineGroupArguments {
        VirtualMachineGroupArguments {
            name: self.name.as_deref_option().map(str::to_owned),
            segregate: Some(bool_or(&self.segregate, true)),
        }
    }
}

impl From<VirtualMachineGroup> for VirtualMachineGroupState<'_> {
    fn from(group: VirtualMachineGroup) -> Self {
        Self {
            id: string_value(group.id),
            name: string_value(group.name),
            segregate: Value::Value(group.segregate),
        }
    }
}

impl WithSchema for VirtualMachineGroupsState<'_> {
    fn schema() -> Schema {
        list_data_source_schema("groups", &BLOCK, "List of the virtual machine groups")
    }
}
