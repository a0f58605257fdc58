use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::api::{fetch_all, find_first, NetworkSpeedProfile};
use crate::meta::MetaHandle;
use crate::utils::{checked, list_data_source_schema, non_empty, string_value, WithSchema};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkSpeedProfileState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub upload_speed: ValueNumber,
    pub download_speed: ValueNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkSpeedProfilesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub profiles: ValueList<Value<NetworkSpeedProfileState<'a>>>,
}

lazy_static! {
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: map! {
            "id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("ID of the network speed profile"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "name" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the network speed profile"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "permalink" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Permalink of the network speed profile"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "upload_speed" => Attribute {
                attr_type: AttributeType::Number,
                description: Description::plain("Upload speed in Mbit, `0` means unrestricted"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "download_speed" => Attribute {
                attr_type: AttributeType::Number,
                description: Description::plain("Download speed in Mbit, `0` means unrestricted"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        },
        description: Description::plain("Katapult network speed profile"),
        ..Default::default()
    };
}

impl WithSchema for NetworkSpeedProfileState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithSchema for NetworkSpeedProfilesState<'_> {
    fn schema() -> Schema {
        list_data_source_schema("profiles", &BLOCK, "List of the network speed profiles")
    }
}

impl From<NetworkSpeedProfile> for NetworkSpeedProfileState<'_> {
    fn from(profile: NetworkSpeedProfile) -> Self {
        Self {
            id: string_value(profile.id),
            name: string_value(profile.name),
            permalink: string_value(profile.permalink),
            upload_speed: Value::Value(profile.upload_speed_in_mbit),
            download_speed: Value::Value(profile.download_speed_in_mbit),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkSpeedProfileDataSource {
    meta: MetaHandle,
}

impl NetworkSpeedProfileDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for NetworkSpeedProfileDataSource {
    type State<'a> = NetworkSpeedProfileState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworkSpeedProfileState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_null() && config.permalink.is_null() {
            diags.error(
                "Missing network speed profile lookup",
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
        let id = non_empty(&config.id);
        let permalink = non_empty(&config.permalink);

        let profile = checked(
            diags,
            "Failed to list network speed profiles",
            find_first(
                |page| {
                    meta.client
                        .list_network_speed_profiles(&meta.organization, page)
                },
                |profile: &NetworkSpeedProfile| {
                    id.as_deref() == Some(profile.id.as_str())
                        || permalink.as_deref() == Some(profile.permalink.as_str())
                },
            )
            .await,
        )?;

        match profile {
            Some(profile) => Some(profile.into()),
            None => {
                diags.root_error_short("Network speed profile not found");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkSpeedProfilesDataSource {
    meta: MetaHandle,
}

impl NetworkSpeedProfilesDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for NetworkSpeedProfilesDataSource {
    type State<'a> = NetworkSpeedProfilesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworkSpeedProfilesState::schema())
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
        let profiles = checked(
            diags,
            "Failed to list network speed profiles",
            fetch_all(|page| {
                meta.client
                    .list_network_speed_profiles(&meta.organization, page)
            })
            .await,
        )?;

        Some(NetworkSpeedProfilesState {
            id: string_value(meta.organization.to_string()),
            profiles: Value::Value(
                profiles
                    .into_iter()
                    .map(|profile| Value::Value(profile.into()))
                    .collect(),
            ),
        })
    }
}
