use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::api::{fetch_all, find_first, DiskTemplate, Lookup};
use crate::meta::MetaHandle;
use crate::utils::{
    bool_or, checked, list_data_source_schema, non_empty, string_or_null, string_value,
    WithSchema,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiskTemplateState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub permalink: ValueString<'a>,
    pub universal: ValueBool,
    pub template_version: ValueNumber,
    pub os_family: ValueString<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiskTemplatesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub include_universal: ValueBool,
    pub templates: ValueList<Value<DiskTemplateState<'a>>>,
}

lazy_static! {
    static ref BLOCK: Block = Block {
        version: 1,
        attributes: map! {
            "id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("ID of the disk template"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "name" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the disk template"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "description" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Description of the disk template"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "permalink" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Permalink of the disk template"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "universal" => Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Whether the template is available to every organization"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "template_version" => Attribute {
                attr_type: AttributeType::Number,
                description: Description::plain("Number of the latest version of the template"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "os_family" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Operating system installed by the template"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        },
        description: Description::plain("Katapult disk template"),
        ..Default::default()
    };
}

impl WithSchema for DiskTemplateState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithSchema for DiskTemplatesState<'_> {
    fn schema() -> Schema {
        let mut schema =
            list_data_source_schema("templates", &BLOCK, "List of the available disk templates");
        schema.block.attributes.insert(
            String::from("include_universal"),
            Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Include universal disk templates (default: true)"),
                constraint: AttributeConstraint::Optional,
                ..Default::default()
            },
        );
        schema
    }
}

impl From<DiskTemplate> for DiskTemplateState<'_> {
    fn from(template: DiskTemplate) -> Self {
        Self {
            id: string_value(template.id),
            name: string_value(template.name),
            description: string_or_null(template.description),
            permalink: string_value(template.permalink),
            universal: Value::Value(template.universal),
            template_version: template.latest_version.map(|version| version.number).into(),
            os_family: template
                .operating_system
                .map_or(Value::Null, |os| string_or_null(os.name)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiskTemplateDataSource {
    meta: MetaHandle,
}

impl DiskTemplateDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for DiskTemplateDataSource {
    type State<'a> = DiskTemplateState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DiskTemplateState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_null() && config.permalink.is_null() {
            diags.error(
                "Missing disk template lookup",
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
        let lookup = match non_empty(&config.id).or_else(|| non_empty(&config.permalink)) {
            Some(value) => Lookup::from_prefixed(&value, "dtpl_"),
            None => {
                diags.root_error_short("One of `id` or `permalink` must be set");
                return None;
            }
        };

        let template = checked(
            diags,
            "Failed to list disk templates",
            find_first(
                |page| {
                    meta.client
                        .list_disk_templates(&meta.organization, true, page)
                },
                |template: &DiskTemplate| match &lookup {
                    Lookup::Id(id) => &template.id == id,
                    Lookup::Permalink(permalink) => &template.permalink == permalink,
                },
            )
            .await,
        )?;

        match template {
            Some(template) => Some(template.into()),
            None => {
                diags.root_error(
                    "Disk template not found",
                    format!("No disk template matches `{lookup}`"),
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiskTemplatesDataSource {
    meta: MetaHandle,
}

impl DiskTemplatesDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for DiskTemplatesDataSource {
    type State<'a> = DiskTemplatesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DiskTemplatesState::schema())
    }

    async fn validate<'a>(&self, _diags: &mut Diagnostics, _config: Self::State<'a>) -> Option<()> {
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags)?;
        let include_universal = bool_or(&config.include_universal, true);

        let templates = checked(
            diags,
            "Failed to list disk templates",
            fetch_all(|page| {
                meta.client
                    .list_disk_templates(&meta.organization, include_universal, page)
            })
            .await,
        )?;

        Some(DiskTemplatesState {
            id: string_value(meta.organization.to_string()),
            include_universal: Value::Value(include_universal),
            templates: Value::Value(
                templates
                    .into_iter()
                    .map(|template| Value::Value(template.into()))
                    .collect(),
            ),
        })
    }
}
