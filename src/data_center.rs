use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::api::{DataCenter, Lookup};
use crate::meta::MetaHandle;
use crate::utils::{checked, non_empty, string_or_null, string_value, WithSchema};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataCenterState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub country_id: ValueString<'a>,
    pub country_name: ValueString<'a>,
}

lazy_static! {
    static ref SCHEMA: Schema = Schema {
        version: 1,
        block: Block {
            version: 1,
            attributes: map! {
                "id" => Attribute {
                    attr_type: AttributeType::String,
                    description: Description::plain("ID of the data center"),
                    constraint: AttributeConstraint::OptionalComputed,
                    ..Default::default()
                },
                "name" => Attribute {
                    attr_type: AttributeType::String,
                    description: Description::plain("Name of the data center"),
                    constraint: AttributeConstraint::Computed,
                    ..Default::default()
                },
                "permalink" => Attribute {
                    attr_type: AttributeType::String,
                    description: Description::plain("Permalink of the data center"),
                    constraint: AttributeConstraint::OptionalComputed,
                    ..Default::default()
                },
                "country_id" => Attribute {
                    attr_type: AttributeType::String,
                    description: Description::plain("ID of the country the data center is in"),
                    constraint: AttributeConstraint::Computed,
                    ..Default::default()
                },
                "country_name" => Attribute {
                    attr_type: AttributeType::String,
                    description: Description::plain("Name of the country the data center is in"),
                    constraint: AttributeConstraint::Computed,
                    ..Default::default()
                },
            },
            description: Description::plain(
                "Katapult data center, the one of the provider configuration if neither `id` nor `permalink` is set",
            ),
            ..Default::default()
        },
    };
}

impl WithSchema for DataCenterState<'_> {
    fn schema() -> Schema {
        SCHEMA.clone()
    }
}

impl From<DataCenter> for DataCenterState<'_> {
    fn from(dc: DataCenter) -> Self {
        let country = dc.country.unwrap_or_default();
        Self {
            id: string_value(dc.id),
            name: string_value(dc.name),
            permalink: string_value(dc.permalink),
            country_id: string_or_null(country.id),
            country_name: string_or_null(country.name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataCenterDataSource {
    meta: MetaHandle,
}

impl DataCenterDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for DataCenterDataSource {
    type State<'a> = DataCenterState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DataCenterState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_value() && config.permalink.is_value() {
            diags.error(
                "Conflicting data center lookup",
                "Only one of `id` and `permalink` can be set",
                AttributePath::new("permalink"),
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
            (None, None) => meta.data_center.clone(),
        };

        let dc = checked(
            diags,
            "Failed to read data center",
            meta.client.get_data_center(&lookup).await,
        )?;
        Some(dc.into())
    }
}
