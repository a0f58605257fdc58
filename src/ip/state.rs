use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::{IpAddress, IpVersion};
use crate::utils::{data_source_block, string_or_null, string_value, WithSchema, WithValidate};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IpState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub network_id: ValueString<'a>,
    pub version: ValueNumber,
    pub address: ValueString<'a>,
    pub address_with_mask: ValueString<'a>,
    pub reverse_dns: ValueString<'a>,
    pub vip: ValueBool,
    pub label: ValueString<'a>,
    pub allocation_type: ValueString<'a>,
    pub allocation_id: ValueString<'a>,
}

fn computed_string(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

lazy_static! {
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: map! {
            "id" => computed_string("ID of the IP address"),
            "network_id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain(
                    "Network to allocate the address from, the default network of the data center if not set",
                ),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "version" => Attribute {
                attr_type: AttributeType::Number,
                description: Description::plain("IP version, 4 or 6 (default: 4)"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "address" => computed_string("The IP address"),
            "address_with_mask" => computed_string("The IP address with its network mask"),
            "reverse_dns" => computed_string("Reverse DNS name of the address"),
            "vip" => Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Use the address as a virtual IP (default: false)"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "label" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("VIP label, required when `vip` is true"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "allocation_type" => computed_string("Type of the object the address is allocated to"),
            "allocation_id" => computed_string("ID of the object the address is allocated to"),
        },
        description: Description::plain("Katapult IP address"),
        ..Default::default()
    };
}

impl WithSchema for IpState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithValidate for IpState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(version) = self.version {
            if version != 4 && version != 6 {
                diags.error(
                    "Invalid IP version",
                    format!("`version` must be 4 or 6, got {version}"),
                    attr_path.clone().attribute("version"),
                );
            }
        }

        if let Value::Value(label) = &self.label {
            if label.is_empty() {
                diags.error_short(
                    "`label` cannot be empty",
                    attr_path.clone().attribute("label"),
                );
            }
        }

        if self.vip == Value::Value(true) && self.label.is_null() {
            diags.error(
                "Missing VIP label",
                "`label` is required when `vip` is true",
                attr_path.attribute("label"),
            );
        }
    }
}

impl IpState<'_> {
    pub fn data_source_schema() -> Schema {
        Schema {
            version: 1,
            block: data_source_block(&BLOCK, &["id", "address"]),
        }
    }

    pub fn ip_version(&self) -> IpVersion {
        match self.version {
            Value::Value(6) => IpVersion::V6,
            _ => IpVersion::V4,
        }
    }

    /// Fill the computed attributes unknown until the address is allocated
    pub fn mark_computed_unknown(&mut self) {
        self.id = Value::Unknown;
        self.address = Value::Unknown;
        self.address_with_mask = Value::Unknown;
        self.reverse_dns = Value::Unknown;
        self.allocation_type = Value::Unknown;
        self.allocation_id = Value::Unknown;
        if self.network_id.is_null() {
            self.network_id = Value::Unknown;
        }
    }

    pub fn apply_defaults(&mut self) {
        if self.version.is_null() {
            self.version = Value::Value(4);
        }
        if self.vip.is_null() {
            self.vip = Value::Value(false);
        }
    }
}

impl From<IpAddress> for IpState<'_> {
    fn from(ip: IpAddress) -> Self {
        Self {
            version: Value::Value(ip.version()),
            id: string_value(ip.id),
            network_id: ip
                .network
                .map_or(Value::Null, |network| string_or_null(network.id)),
            address: string_value(ip.address),
            address_with_mask: string_or_null(ip.address_with_mask),
            reverse_dns: string_or_null(ip.reverse_dns),
            vip: Value::Value(ip.vip),
            label: string_or_null(ip.label),
            allocation_type: ip.allocation_type.map_or(Value::Null, string_or_null),
            allocation_id: ip.allocation_id.map_or(Value::Null, string_or_null),
        }
    }
}
