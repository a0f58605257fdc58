use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueList, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::SecurityGroup;
use crate::utils::{
    computed_attributes, list_data_source_schema, non_empty, set_strings, string_or_null,
    string_set, string_value, WithSchema, WithValidate,
};

use super::rules::{Rule, INBOUND, OUTBOUND};

pub const RULE_PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP"];

/// Inline rule of a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub ports: ValueString<'a>,
    pub targets: ValueSet<ValueString<'a>>,
    pub notes: ValueString<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub associations: ValueSet<ValueString<'a>>,
    pub allow_all_inbound: ValueBool,
    pub allow_all_outbound: ValueBool,
    pub external_rules: ValueBool,
    pub inbound_rule: ValueList<Value<RuleState<'a>>>,
    pub outbound_rule: ValueList<Value<RuleState<'a>>>,
}

/// Security group as returned by the data sources
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupDataState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub associations: ValueSet<ValueString<'a>>,
    pub allow_all_inbound: ValueBool,
    pub allow_all_outbound: ValueBool,
    pub include_rules: ValueBool,
    pub inbound_rules: ValueList<Value<RuleState<'a>>>,
    pub outbound_rules: ValueList<Value<RuleState<'a>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupsState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub include_rules: ValueBool,
    pub security_groups: ValueList<Value<SecurityGroupDataState<'a>>>,
}

lazy_static! {
    pub(crate) static ref RULE_ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the rule"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "protocol" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Protocol of the rule, one of `TCP`, `UDP` or `ICMP`"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "ports" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Comma separated ports or port ranges, all ports if not set"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "targets" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain("IP addresses, networks or `all:ipv4` / `all:ipv6`"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "notes" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Notes of the rule"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
    };
    static ref RULE_BLOCK: Block = Block {
        attributes: RULE_ATTRIBUTES.clone(),
        ..Default::default()
    };
    static ref ATTRIBUTES: HashMap<String, Attribute> = map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("ID of the security group"),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        },
        "name" => Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Name of the security group"),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        },
        "associations" => Attribute {
            attr_type: AttributeType::Set(AttributeType::String.into()),
            description: Description::plain(
                "Virtual machines, groups or tags the security group applies to",
            ),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "allow_all_inbound" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain("Allow all inbound traffic (default: false)"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "allow_all_outbound" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain("Allow all outbound traffic (default: false)"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
    };
    static ref SCHEMA: Schema = {
        let mut attributes = ATTRIBUTES.clone();
        attributes.insert(
            String::from("external_rules"),
            Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain(
                    "Rules are managed with `katapult_security_group_rule` resources, inline rules are ignored (default: false)",
                ),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
        );
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                blocks: map! {
                    "inbound_rule" => NestedBlock::List(Block {
                        description: Description::plain("Inbound rule"),
                        ..RULE_BLOCK.clone()
                    }),
                    "outbound_rule" => NestedBlock::List(Block {
                        description: Description::plain("Outbound rule"),
                        ..RULE_BLOCK.clone()
                    }),
                },
                description: Description::plain("Katapult security group"),
                ..Default::default()
            },
        }
    };
    static ref DATA_BLOCK: Block = {
        let mut attributes = computed_attributes(&ATTRIBUTES);
        let rules = computed_attributes(&RULE_ATTRIBUTES);
        let extra: HashMap<String, Attribute> = map! {
            "include_rules" => Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Include the rules of the security group"),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
            "inbound_rules" => Attribute {
                attr_type: AttributeType::AttributeList(rules.clone()),
                description: Description::plain("Inbound rules"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "outbound_rules" => Attribute {
                attr_type: AttributeType::AttributeList(rules),
                description: Description::plain("Outbound rules"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        };
        attributes.extend(extra);
        Block {
            version: 1,
            attributes,
            description: Description::plain("Security group and its rules"),
            ..Default::default()
        }
    };
}

fn validate_rules(
    diags: &mut Diagnostics,
    rules: &ValueList<Value<RuleState<'_>>>,
    attr_path: AttributePath,
) {
    for (i, rule) in rules.iter().flatten().enumerate() {
        let Value::Value(rule) = rule else {
            continue;
        };
        if let Value::Value(protocol) = &rule.protocol {
            if !RULE_PROTOCOLS.iter().any(|candidate| candidate == protocol) {
                diags.error(
                    "Unsupported protocol",
                    format!("`{protocol}` must be one of: TCP, UDP, ICMP"),
                    attr_path.clone().index(i as i64).attribute("protocol"),
                );
            }
        }
    }
}

impl WithSchema for SecurityGroupState<'_> {
    fn schema() -> Schema {
        SCHEMA.clone()
    }
}

impl WithValidate for SecurityGroupState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if matches!(&self.name, Value::Value(name) if name.trim().is_empty()) {
            diags.error_short("`name` cannot be empty", attr_path.clone().attribute("name"));
        }
        validate_rules(
            diags,
            &self.inbound_rule,
            attr_path.clone().attribute("inbound_rule"),
        );
        validate_rules(
            diags,
            &self.outbound_rule,
            attr_path.attribute("outbound_rule"),
        );
    }
}

impl<'a> RuleState<'a> {
    pub fn to_rule(&self, direction: &str) -> Rule {
        Rule {
            id: non_empty(&self.id),
            direction: direction.to_owned(),
            protocol: self.protocol.as_deref_option().unwrap_or_default().to_owned(),
            ports: self.ports.as_deref_option().unwrap_or_default().to_owned(),
            targets: set_strings(&self.targets),
            notes: self.notes.as_deref_option().unwrap_or_default().to_owned(),
        }
    }
}

impl From<Rule> for RuleState<'_> {
    fn from(rule: Rule) -> Self {
        Self {
            id: rule.id.map_or(Value::Null, string_value),
            protocol: string_value(rule.protocol),
            ports: string_or_null(rule.ports),
            targets: if rule.targets.is_empty() {
                Value::Null
            } else {
                string_set(rule.targets)
            },
            notes: string_or_null(rule.notes),
        }
    }
}

pub(crate) fn rules_of(rules: &ValueList<Value<RuleState<'_>>>, direction: &str) -> Vec<Rule> {
    rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.as_ref_option().map(|rule| rule.to_rule(direction)))
        .collect()
}

pub(crate) fn rule_list<'a>(rules: Vec<Rule>) -> ValueList<Value<RuleState<'a>>> {
    Value::Value(
        rules
            .into_iter()
            .map(|rule| Value::Value(rule.into()))
            .collect(),
    )
}

/// Empty rule lists are null, as when no rule block is given
fn rule_blocks<'a>(rules: Vec<Rule>) -> ValueList<Value<RuleState<'a>>> {
    if rules.is_empty() {
        Value::Null
    } else {
        rule_list(rules)
    }
}

fn associations<'a>(values: Vec<String>) -> ValueSet<ValueString<'a>> {
    if values.is_empty() {
        Value::Null
    } else {
        string_set(values)
    }
}

impl<'a> SecurityGroupState<'a> {
    pub fn external_rules(&self) -> bool {
        self.external_rules == Value::Value(true)
    }

    pub fn inbound_rules(&self) -> Vec<Rule> {
        rules_of(&self.inbound_rule, INBOUND)
    }

    pub fn outbound_rules(&self) -> Vec<Rule> {
        rules_of(&self.outbound_rule, OUTBOUND)
    }

    pub fn apply_defaults(&mut self) {
        for value in [
            &mut self.allow_all_inbound,
            &mut self.allow_all_outbound,
            &mut self.external_rules,
        ] {
            if value.is_null() {
                *value = Value::Value(false);
            }
        }
    }

    /// Rules without id are yet to be created, unless rules are managed elsewhere
    pub fn mark_new_rules_unknown(&mut self) {
        if self.external_rules() {
            return;
        }
        for rules in [&mut self.inbound_rule, &mut self.outbound_rule] {
            for rule in rules.iter_mut().flatten() {
                if let Value::Value(rule) = rule {
                    if rule.id.is_null() {
                        rule.id = Value::Unknown;
                    }
                }
            }
        }
    }

    /// State of `group`, with `rules` as (inbound, outbound) when they are managed inline
    pub fn flatten(
        group: SecurityGroup,
        rules: Option<(Vec<Rule>, Vec<Rule>)>,
        prior: &Self,
    ) -> Self {
        let (inbound_rule, outbound_rule) = match rules {
            Some((inbound, outbound)) => (rule_blocks(inbound), rule_blocks(outbound)),
            None => (prior.inbound_rule.clone(), prior.outbound_rule.clone()),
        };
        Self {
            id: string_value(group.id),
            name: string_value(group.name),
            associations: associations(group.associations),
            allow_all_inbound: Value::Value(group.allow_all_inbound),
            allow_all_outbound: Value::Value(group.allow_all_outbound),
            external_rules: Value::Value(prior.external_rules()),
            inbound_rule,
            outbound_rule,
        }
    }
}

impl WithSchema for SecurityGroupDataState<'_> {
    fn schema() -> Schema {
        let mut block = DATA_BLOCK.clone();
        if let Some(id) = block.attributes.get_mut("id") {
            id.constraint = AttributeConstraint::Required;
        }
        Schema { version: 1, block }
    }
}

impl<'a> SecurityGroupDataState<'a> {
    pub fn flatten(
        group: SecurityGroup,
        include_rules: bool,
        rules: Option<(Vec<Rule>, Vec<Rule>)>,
    ) -> Self {
        let (inbound_rules, outbound_rules) = match rules {
            Some((inbound, outbound)) => (rule_list(inbound), rule_list(outbound)),
            None => (Value::Null, Value::Null),
        };
        Self {
            id: string_value(group.id),
            name: string_value(group.name),
            associations: string_set(group.associations),
            allow_all_inbound: Value::Value(group.allow_all_inbound),
            allow_all_outbound: Value::Value(group.allow_all_outbound),
            include_rules: Value::Value(include_rules),
            inbound_rules,
            outbound_rules,
        }
    }
}

impl WithSchema for SecurityGroupsState<'_> {
    fn schema() -> Schema {
        let mut schema = list_data_source_schema(
            "security_groups",
            &DATA_BLOCK,
            "List of the security groups of the organization",
        );
        schema.block.attributes.insert(
            String::from("include_rules"),
            Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain(
                    "Include the rules of every security group, one extra request per group (default: false)",
                ),
                constraint: AttributeConstraint::OptionalComputed,
                ..Default::default()
            },
        );
        schema
    }
}
