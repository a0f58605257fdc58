use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueNumber, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};
use tracing::info;

use crate::api::{self, ApiError};
use crate::waiter::WaitError;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Owned string value, null if empty
pub(crate) fn string_or_null<'a, S: Into<String>>(value: S) -> ValueString<'a> {
    let value = value.into();
    if value.is_empty() {
        Value::Null
    } else {
        Value::Value(Cow::Owned(value))
    }
}

pub(crate) fn string_value<'a, S: Into<String>>(value: S) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

pub(crate) fn string_set<'a, I, S>(values: I) -> ValueSet<ValueString<'a>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Value(values.into_iter().map(string_value).collect())
}

/// Known strings of a set, in order
pub(crate) fn set_strings(values: &ValueSet<ValueString<'_>>) -> Vec<String> {
    values
        .iter()
        .flatten()
        .filter_map(|value| value.as_deref_option().map(str::to_owned))
        .collect()
}

/// Elements of `new` missing from `old`, and elements of `old` missing from `new`
pub(crate) fn strings_diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set = old.iter().collect::<BTreeSet<_>>();
    let new_set = new.iter().collect::<BTreeSet<_>>();
    let added = new
        .iter()
        .filter(|value| !old_set.contains(value))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|value| !new_set.contains(value))
        .cloned()
        .collect();
    (added, removed)
}

/// Optional string of the config: `None` when null, unknown or empty
pub(crate) fn non_empty(value: &ValueString<'_>) -> Option<String> {
    value
        .as_deref_option()
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Turn a resource attribute table into a data source one, where everything is computed
pub(crate) fn computed_attributes(
    attributes: &HashMap<String, Attribute>,
) -> HashMap<String, Attribute> {
    attributes
        .iter()
        .map(|(name, attribute)| {
            let attr_type = match &attribute.attr_type {
                AttributeType::AttributeSingle(inner) => {
                    AttributeType::AttributeSingle(computed_attributes(inner))
                }
                AttributeType::AttributeList(inner) => {
                    AttributeType::AttributeList(computed_attributes(inner))
                }
                AttributeType::AttributeSet(inner) => {
                    AttributeType::AttributeSet(computed_attributes(inner))
                }
                other => other.clone(),
            };
            (
                name.clone(),
                Attribute {
                    attr_type,
                    constraint: AttributeConstraint::Computed,
                    ..attribute.clone()
                },
            )
        })
        .collect()
}

/// Nested blocks cannot be computed: they become computed nested attributes
pub(crate) fn computed_block_attribute(block: &NestedBlock) -> Attribute {
    let (attr_type, inner): (fn(HashMap<String, Attribute>) -> AttributeType, &Block) = match block
    {
        NestedBlock::Single(inner) | NestedBlock::Optional(inner) | NestedBlock::Group(inner) => {
            (AttributeType::AttributeSingle, inner)
        }
        NestedBlock::List(inner) => (AttributeType::AttributeList, inner),
        NestedBlock::Set(inner) => (AttributeType::AttributeSet, inner),
        NestedBlock::Map(inner) => (AttributeType::AttributeMap, inner),
    };
    Attribute {
        attr_type: attr_type(computed_attributes(&inner.attributes)),
        description: inner.description.clone(),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

/// Data source block derived from a resource block
///
/// `lookups` are the attributes kept optional to select the object.
pub(crate) fn data_source_block(resource: &Block, lookups: &[&str]) -> Block {
    let mut attributes = computed_attributes(&resource.attributes);
    for name in lookups {
        if let Some(attribute) = attributes.get_mut(*name) {
            attribute.constraint = AttributeConstraint::OptionalComputed;
        }
    }
    for (name, block) in &resource.blocks {
        attributes.insert(name.clone(), computed_block_attribute(block));
    }
    Block {
        attributes,
        blocks: Default::default(),
        ..resource.clone()
    }
}

/// Schema of a data source listing objects
///
/// `id` is set to the organization the objects belong to, or `all`.
pub(crate) fn list_data_source_schema(
    attribute: &str,
    item: &Block,
    description: &'static str,
) -> Schema {
    let mut attributes = computed_attributes(&item.attributes);
    for (name, block) in &item.blocks {
        attributes.insert(name.clone(), computed_block_attribute(block));
    }
    Schema {
        version: 1,
        block: Block {
            version: 1,
            attributes: [
                (
                    String::from("id"),
                    Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Organization of the listed objects, `all` for global lists"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                ),
                (
                    attribute.to_owned(),
                    Attribute {
                        attr_type: AttributeType::AttributeList(attributes),
                        description: item.description.clone(),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                ),
            ]
            .into_iter()
            .collect(),
            description: Description::plain(description),
            ..Default::default()
        },
    }
}

pub(crate) fn bool_or(value: &ValueBool, default: bool) -> bool {
    value.as_ref_option().copied().unwrap_or(default)
}

pub(crate) fn number_or(value: &ValueNumber, default: i64) -> i64 {
    value.as_ref_option().copied().unwrap_or(default)
}

/// Record `name` as a replacement trigger if its planned value differs from the prior one
pub(crate) fn replace_if_changed<T: PartialEq>(
    triggers: &mut Vec<AttributePath>,
    name: &'static str,
    prior: &T,
    proposed: &T,
) {
    if prior != proposed {
        triggers.push(AttributePath::new(name));
    }
}

/// Result of a read, `None` if the object is gone or the read failed
///
/// A missing object is not an error: the caller drops it from the state.
pub(crate) fn found<T>(
    diags: &mut Diagnostics,
    summary: &'static str,
    result: api::Result<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_not_found() => {
            info!(reason = %err, "object not found, removing it from the state");
            None
        }
        Err(err) => {
            report_api_error(diags, summary, &err);
            None
        }
    }
}

/// Result of an API call, reporting any error
pub(crate) fn checked<T>(
    diags: &mut Diagnostics,
    summary: &'static str,
    result: api::Result<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            report_api_error(diags, summary, &err);
            None
        }
    }
}

pub(crate) fn report_api_error(diags: &mut Diagnostics, summary: &'static str, err: &ApiError) {
    diags.root_error(summary, err.to_string());
}

pub(crate) fn report_wait_error(diags: &mut Diagnostics, summary: &'static str, err: &WaitError) {
    diags.root_error(summary, err.to_string());
}

pub(crate) fn report<E: Display>(
    diags: &mut Diagnostics,
    summary: &'static str,
    attr_path: AttributePath,
    err: E,
) {
    diags.error(summary, err.to_string(), attr_path);
}
