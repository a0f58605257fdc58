use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::api::{Lookup, Network};
use crate::meta::MetaHandle;
use crate::utils::{
    checked, list_data_source_schema, non_empty, string_or_null, string_value, WithSchema,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub data_center_id: ValueString<'a>,
    pub default: ValueBool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkItemState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub data_center_id: ValueString<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworksState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub networks: ValueList<Value<NetworkItemState<'a>>>,
}

/// Mutually exclusive ways of selecting a network
const LOOKUPS: [&str; 3] = ["id", "permalink", "data_center_id"];

fn string_attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

lazy_static! {
    static ref ITEM_ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => string_attribute("ID of the network", AttributeConstraint::OptionalComputed),
        "name" => string_attribute("Name of the network", AttributeConstraint::Computed),
        "permalink" => string_attribute("Permalink of the network", AttributeConstraint::OptionalComputed),
        "data_center_id" => string_attribute(
            "ID of the data center of the network",
            AttributeConstraint::OptionalComputed,
        ),
    };
    static ref ITEM_BLOCK: Block = Block {
        version: 1,
        attributes: ITEM_ATTRIBUTES.clone(),
        description: Description::plain("Katapult network"),
        ..Default::default()
    };
    static ref SCHEMA: Schema = {
        let mut attributes = ITEM_ATTRIBUTES.clone();
        attributes.insert(
            String::from("default"),
            Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Whether this is the default network of its data center"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        );
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                description: Description::plain(
                    "Katapult network, the default network of `data_center_id` (or of the provider data center) if neither `id` nor `permalink` is set",
                ),
                ..Default::default()
            },
        }
    };
}

impl WithSchema for NetworkState<'_> {
    fn schema() -> Schema {
        SCHEMA.clone()
    }
}

impl WithSchema for NetworksState<'_> {
    fn schema() -> Schema {
        list_data_source_schema(
            "networks",
            &ITEM_BLOCK,
            "Networks available to the organization",
        )
    }
}

fn data_center_id<'a>(network: &Network) -> ValueString<'a> {
    network
        .data_center
        .as_ref()
        .map_or(Value::Null, |dc| string_or_null(dc.id.clone()))
}

impl<'a> NetworkState<'a> {
    fn new(network: Network, default: bool) -> Self {
        Self {
            data_center_id: data_center_id(&network),
            id: string_value(network.id),
            name: string_value(network.name),
            permalink: string_or_null(network.permalink),
            default: Value::Value(default),
        }
    }
}

impl From<Network> for NetworkItemState<'_> {
    fn from(network: Network) -> Self {
        Self {
            data_center_id: data_center_id(&network),
            id: string_value(network.id),
            name: string_value(network.name),
            permalink: string_or_null(network.permalink),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkDataSource {
    meta: MetaHandle,
}

impl NetworkDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for NetworkDataSource {
    type State<'a> = NetworkState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworkState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let set = LOOKUPS
            .into_iter()
            .zip([&config.id, &config.permalink, &config.data_center_id])
            .filter(|(_, value)| value.is_value())
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        if set.len() > 1 {
            diags.error(
                "Conflicting network lookup",
                format!(
                    "Only one of `id`, `permalink` and `data_center_id` can be set, got: {}",
                    set.join(", ")
                ),
                AttributePath::new(set[1]),
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
                let data_center = non_empty(&config.data_center_id)
                    .map_or_else(|| meta.data_center.clone(), Lookup::Id);
                let network = checked(
                    diags,
                    "Failed to read the default network",
                    meta.client.get_default_network(&data_center).await,
                )?;
                return Some(NetworkState::new(network, true));
            }
        };

        let network = checked(
            diags,
            "Failed to read network",
            meta.client.get_network(&lookup).await,
        )?;
        let Some(data_center) = network.data_center.clone() else {
            diags.root_error(
                "Failed to read network",
                format!("The API returned no data center for the network `{lookup}`"),
            );
            return None;
        };
        let default = checked(
            diags,
            "Failed to read the default network",
            meta.client
                .get_default_network(&Lookup::Id(data_center.id))
                .await,
        )?;
        let is_default = default.id == network.id;
        Some(NetworkState::new(network, is_default))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworksDataSource {
    meta: MetaHandle,
}

impl NetworksDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for NetworksDataSource {
    type State<'a> = NetworksState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworksState::schema())
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
        let networks = checked(
            diags,
            "Failed to list networks",
            meta.client.list_networks(&meta.organization).await,
        )?;

        Some(NetworksState {
            id: string_value(meta.organization.to_string()),
            networks: Value::Value(
                networks
                    .into_iter()
                    .map(|network| Value::Value(network.into()))
                    .collect(),
            ),
        })
    }
}
