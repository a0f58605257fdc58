use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::api::{fetch_all, Lookup, VirtualMachinePackage};
use crate::meta::MetaHandle;
use crate::utils::{
    checked, list_data_source_schema, non_empty, string_or_null, string_value, WithSchema,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VirtualMachinePackageState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub cpu_cores: ValueNumber,
    pub ipv4_addresses: ValueNumber,
    pub memory_in_gb: ValueNumber,
    pub storage_in_gb: ValueNumber,
    pub privacy: ValueString<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VirtualMachinePackagesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub packages: ValueList<Value<VirtualMachinePackageState<'a>>>,
}

fn computed_number(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::Number,
        description: Description::plain(description),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

lazy_static! {
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: map! {
            "id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("ID of the package"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "name" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the package"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "permalink" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Permalink of the package"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "cpu_cores" => computed_number("Number of CPU cores"),
            "ipv4_addresses" => computed_number("Number of included IPv4 addresses"),
            "memory_in_gb" => computed_number("Memory in GB"),
            "storage_in_gb" => computed_number("Storage in GB"),
            "privacy" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Privacy of the package"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        },
        description: Description::plain("Katapult virtual machine package, looked up by `id` or `permalink`"),
        ..Default::default()
    };
}

impl WithSchema for VirtualMachinePackageState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithSchema for VirtualMachinePackagesState<'_> {
    fn schema() -> Schema {
        list_data_source_schema("packages", &BLOCK, "List of the virtual machine packages")
    }
}

impl From<VirtualMachinePackage> for VirtualMachinePackageState<'_> {
    fn from(package: VirtualMachinePackage) -> Self {
        Self {
            id: string_value(package.id),
            name: string_value(package.name),
            permalink: string_value(package.permalink),
            cpu_cores: Value::Value(package.cpu_cores),
            ipv4_addresses: Value::Value(package.ipv4_addresses),
            memory_in_gb: Value::Value(package.memory_in_gb),
            storage_in_gb: Value::Value(package.storage_in_gb),
            privacy: string_or_null(package.privacy),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualMachinePackageDataSource {
    meta: MetaHandle,
}

impl VirtualMachinePackageDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for VirtualMachinePackageDataSource {
    type State<'a> = VirtualMachinePackageState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachinePackageState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_null() && config.permalink.is_null() {
            diags.error(
                "Missing package lookup",
                "One of `id` or `permalink` must be set",
                AttributePath::new("id"),
            );
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags)?;
        let lookup = match (non_empty(&config.id), non_empty(&config.permalink)) {
            (Some(id), _) => Lookup::Id(id),
            (None, Some(permalink)) => Lookup::Permalink(permalink),
            (None, None) => {
                diags.root_error_short("One of `id` or `permalink` must be set");
                return None;
            }
        };

        let package = checked(
            diags,
            "Failed to read virtual machine package",
            meta.client.get_virtual_machine_package(&lookup).await,
        )?;
        Some(package.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualMachinePackagesDataSource {
    meta: MetaHandle,
}

impl VirtualMachinePackagesDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for VirtualMachinePackagesDataSource {
    type State<'a> = VirtualMachinePackagesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachinePackagesState::schema())
    }

    async fn validate<'a>(&self, _diags: &mut Diagnostics, _config: Self::State<'a>) -> Option<()> {
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        _config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags)?;
        let packages = checked(
            diags,
            "Failed to list virtual machine packages",
            fetch_all(|page| meta.client.list_virtual_machine_packages(page)).await,
        )?;

        Some(VirtualMachinePackagesState {
            id: string_value("all"),
            packages: Value::Value(
                packages
                    .into_iter()
                    .map(|package| Value::Value(package.into()))
                    .collect(),
            ),
        })
    }
}
