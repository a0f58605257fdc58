use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueList, ValueMap, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::{
    DiskArguments, VirtualMachine, VirtualMachineNetworkInterface, VirtualMachinePackage,
};
use crate::utils::{
    data_source_block, set_strings, string_or_null, string_set, string_value, WithSchema,
    WithValidate,
};

pub const SYSTEM_DISK_NAME: &str = "System Disk";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiskState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub size: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkInterfaceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub network_id: ValueString<'a>,
    pub virtual_network_id: ValueString<'a>,
    pub mac_address: ValueString<'a>,
    pub ip_addresses: ValueSet<ValueString<'a>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VirtualMachineState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub hostname: ValueString<'a>,
    pub description: ValueString<'a>,
    pub fqdn: ValueString<'a>,
    pub state: ValueString<'a>,
    pub package: ValueString<'a>,
    pub disk_template: ValueString<'a>,
    pub disk_template_options: ValueMap<'a, ValueString<'a>>,
    pub disk: ValueList<Value<DiskState<'a>>>,
    pub ip_address_ids: ValueSet<ValueString<'a>>,
    pub ip_addresses: ValueSet<ValueString<'a>>,
    pub virtual_network_ids: ValueSet<ValueString<'a>>,
    pub network_speed_profile: ValueString<'a>,
    pub network_interfaces: ValueList<Value<NetworkInterfaceState<'a>>>,
    pub tags: ValueSet<ValueString<'a>>,
    pub group_id: ValueString<'a>,
}

lazy_static! {
    static ref INTERFACE_ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the network interface"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "network_id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the network the interface is attached to"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "virtual_network_id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the virtual network the interface is attached to"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "mac_address" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("MAC address of the interface"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "ip_addresses" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("IP addresses allocated to the interface"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
    };
    static ref ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the virtual machine"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "name" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Name of the virtual machine"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "hostname" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Hostname of the virtual machine, generated if not set"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "description" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Description of the virtual machine"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "fqdn" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Fully qualified domain name of the virtual machine"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "state" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Power state of the virtual machine"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "package" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Permalink or ID of a virtual machine package"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "disk_template" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Permalink or ID of a disk template"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "disk_template_options" => Attribute {
            attr_type: AttributeType::Map(AttributeType::String.into()),
            description: Description::plain("Options of the disk template"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "ip_address_ids" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("IDs of the IP addresses allocated to the virtual machine"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "ip_addresses" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("IP addresses allocated to the virtual machine"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "virtual_network_ids" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("Virtual networks attached to the virtual machine"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "network_speed_profile" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Permalink of the network speed profile of every interface"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "network_interfaces" => Attribute {
            attr_type: AttributeType::AttributeList(INTERFACE_ATTRIBUTES.clone()),
            description: Description::plain("Network interfaces of the virtual machine"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "tags" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("Tag names of the virtual machine"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "group_id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the virtual machine group"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
    };
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: ATTRIBUTES.clone(),
        blocks: map! {
            "disk" => NestedBlock::List(Block {
                attributes: map! {
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the disk"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "size" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Size of the disk in GB"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                },
                description: Description::plain(
                    "Disks created with the virtual machine, the first one is the boot disk",
                ),
                ..Default::default()
            }),
        },
        description: Description::markdown(
            "Katapult virtual machine. Deleting it purges it from the trash unless \
             `skip_trash_object_purge` is set on the provider.",
        ),
        ..Default::default()
    };
}

impl WithSchema for VirtualMachineState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithValidate for VirtualMachineState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (name, value) in [("package", &self.package), ("disk_template", &self.disk_template)] {
            if matches!(value, Value::Value(value) if value.trim().is_empty()) {
                diags.error_short(
                    format!("`{name}` cannot be empty"),
                    attr_path.clone().attribute(name),
                );
            }
        }
        if matches!(&self.ip_address_ids, Value::Value(ids) if ids.is_empty()) {
            diags.error_short(
                "At least one IP address is required",
                attr_path.clone().attribute("ip_address_ids"),
            );
        }
        for (i, disk) in self.disk.iter().flatten().enumerate() {
            if let Value::Value(DiskState {
                size: Value::Value(size),
                ..
            }) = disk
            {
                if *size <= 0 {
                    diags.error(
                        "Invalid disk size",
                        format!("disk size must be positive, got {size}"),
                        attr_path
                            .clone()
                            .attribute("disk")
                            .index(i as i64)
                            .attribute("size"),
                    );
                }
            }
        }
    }
}

impl<'a> VirtualMachineState<'a> {
    pub fn data_source_schema() -> Schema {
        let block = data_source_block(&BLOCK, &["id", "fqdn"]);
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Katapult virtual machine, looked up by id or fqdn"),
                ..block
            },
        }
    }

    /// Disks to build, unnamed disks get a default name
    pub fn disks(&self) -> Vec<DiskArguments> {
        self.disk
            .iter()
            .flatten()
            .filter_map(|disk| disk.as_ref_option())
            .enumerate()
            .map(|(i, disk)| DiskArguments {
                name: match disk.name.as_deref_option() {
                    Some(name) if !name.is_empty() => name.to_owned(),
                    _ if i == 0 => String::from(SYSTEM_DISK_NAME),
                    _ => format!("Disk #{}", i + 1),
                },
                size_in_gb: disk.size.as_ref_option().copied().unwrap_or_default(),
            })
            .collect()
    }

    pub fn disk_template_options(&self) -> BTreeMap<String, String> {
        self.disk_template_options
            .iter()
            .flatten()
            .filter_map(|(key, value)| Some((key.to_string(), value.as_deref_option()?.to_owned())))
            .collect()
    }

    pub fn ip_address_ids(&self) -> Vec<String> {
        set_strings(&self.ip_address_ids)
    }

    pub fn virtual_network_ids(&self) -> Vec<String> {
        set_strings(&self.virtual_network_ids)
    }

    pub fn tags(&self) -> Vec<String> {
        set_strings(&self.tags)
    }

    /// Computed attributes become unknown, as well as unset optional computed ones
    pub fn mark_computed_unknown(&mut self) {
        self.fqdn = Value::Unknown;
        self.state = Value::Unknown;
        self.ip_addresses = Value::Unknown;
        self.network_interfaces = Value::Unknown;
        for value in [
            &mut self.name,
            &mut self.hostname,
            &mut self.network_speed_profile,
        ] {
            if value.is_null() {
                *value = Value::Unknown;
            }
        }
        if self.virtual_network_ids.is_null() {
            self.virtual_network_ids = Value::Unknown;
        }
    }

    /// State of a machine read from the API
    ///
    /// Attributes the API does not return are kept from `prior`.
    pub fn flatten(
        vm: VirtualMachine,
        interfaces: Vec<VirtualMachineNetworkInterface>,
        prior: &Self,
    ) -> Self {
        let speed_profile = interfaces
            .first()
            .and_then(|iface| iface.speed_profile.as_ref())
            .map(|profile| profile.permalink.clone())
            .filter(|permalink| !permalink.is_empty());
        let virtual_network_ids = interfaces
            .iter()
            .filter_map(|iface| iface.virtual_network.as_ref())
            .map(|network| network.id.clone())
            .filter(|id| !id.is_empty())
            .collect::<Vec<_>>();

        Self {
            id: string_value(vm.id),
            name: string_value(vm.name),
            hostname: string_value(vm.hostname),
            description: string_or_null(vm.description),
            fqdn: string_value(vm.fqdn),
            state: string_value(vm.state),
            package: package_reference(vm.package, &known(&prior.package)),
            disk_template: known(&prior.disk_template),
            disk_template_options: known(&prior.disk_template_options),
            disk: known(&prior.disk),
            ip_address_ids: string_set(vm.ip_addresses.iter().map(|ip| ip.id.clone())),
            ip_addresses: string_set(vm.ip_addresses.into_iter().map(|ip| ip.address)),
            virtual_network_ids: string_set(virtual_network_ids),
            network_speed_profile: speed_profile
                .map_or_else(|| known(&prior.network_speed_profile), string_value),
            network_interfaces: Value::Value(
                interfaces
                    .into_iter()
                    .map(|iface| Value::Value(iface.into()))
                    .collect(),
            ),
            tags: if vm.tag_names.is_empty() {
                Value::Null
            } else {
                string_set(vm.tag_names)
            },
            group_id: vm.group.map_or(Value::Null, |group| string_or_null(group.id)),
        }
    }
}

/// Value kept from a planned state, unknown values become null
fn known<T: Clone>(value: &Value<T>) -> Value<T> {
    if value.is_unknown() {
        Value::Null
    } else {
        value.clone()
    }
}

/// Package as written by the user if it designates the package of the machine
fn package_reference<'a>(
    package: Option<VirtualMachinePackage>,
    prior: &ValueString<'a>,
) -> ValueString<'a> {
    let Some(package) = package else {
        return prior.clone();
    };
    match prior.as_deref_option() {
        Some(known) if known == package.id || known == package.permalink => prior.clone(),
        _ if !package.permalink.is_empty() => string_value(package.permalink),
        _ => string_or_null(package.id),
    }
}

impl From<VirtualMachineNetworkInterface> for NetworkInterfaceState<'_> {
    fn from(iface: VirtualMachineNetworkInterface) -> Self {
        Self {
            id: string_value(iface.id),
            network_id: iface
                .network
                .map_or(Value::Null, |network| string_or_null(network.id)),
            virtual_network_id: iface
                .virtual_network
                .map_or(Value::Null, |network| string_or_null(network.id)),
            mac_address: string_or_null(iface.mac_address),
            ip_addresses: string_set(iface.ip_addresses.into_iter().map(|ip| ip.address)),
        }
    }
}
