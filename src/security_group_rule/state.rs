use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueList, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::api::SecurityGroupRule;
use crate::security_group::rules::{Rule, INBOUND, OUTBOUND};
use crate::security_group::state::{RuleState, RULE_ATTRIBUTES, RULE_PROTOCOLS};
use crate::utils::{
    computed_attributes, data_source_block, non_empty, set_strings, string_or_null, string_set,
    string_value, WithSchema, WithValidate,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub security_group_id: ValueString<'a>,
    pub direction: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub ports: ValueString<'a>,
    pub targets: ValueSet<ValueString<'a>>,
    pub notes: ValueString<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupRulesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub security_group_id: ValueString<'a>,
    pub inbound_rules: ValueList<Value<RuleState<'a>>>,
    pub outbound_rules: ValueList<Value<RuleState<'a>>>,
}

lazy_static! {
    static ref BLOCK: Block = {
        let mut attributes = RULE_ATTRIBUTES.clone();
        attributes.insert(
            String::from("security_group_id"),
            Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("ID of the security group of the rule"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        );
        attributes.insert(
            String::from("direction"),
            Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Direction of the traffic, `inbound` or `outbound`"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        );
        Block {
            version: 1,
            attributes,
            description: Description::plain("Katapult security group rule"),
            ..Default::default()
        }
    };
}

impl WithSchema for SecurityGroupRuleState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: BLOCK.clone(),
        }
    }
}

impl WithValidate for SecurityGroupRuleState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(direction) = &self.direction {
            if direction != INBOUND && direction != OUTBOUND {
                diags.error(
                    "Unsupported direction",
                    format!("`{direction}` must be one of: inbound, outbound"),
                    attr_path.clone().attribute("direction"),
                );
            }
        }
        if let Value::Value(protocol) = &self.protocol {
            if !RULE_PROTOCOLS.iter().any(|candidate| candidate == protocol) {
                diags.error(
                    "Unsupported protocol",
                    format!("`{protocol}` must be one of: TCP, UDP, ICMP"),
                    attr_path.attribute("protocol"),
                );
            }
        }
    }
}

impl SecurityGroupRuleState<'_> {
    pub fn data_source_schema() -> Schema {
        let mut block = data_source_block(&BLOCK, &[]);
        if let Some(id) = block.attributes.get_mut("id") {
            id.constraint = AttributeConstraint::Required;
        }
        Schema { version: 1, block }
    }

    pub fn to_rule(&self) -> Rule {
        Rule {
            id: non_empty(&self.id),
            direction: self.direction.as_deref_option().unwrap_or_default().to_owned(),
            protocol: self.protocol.as_deref_option().unwrap_or_default().to_owned(),
            ports: self.ports.as_deref_option().unwrap_or_default().to_owned(),
            targets: set_strings(&self.targets),
            notes: self.notes.as_deref_option().unwrap_or_default().to_owned(),
        }
    }
}

impl From<SecurityGroupRule> for SecurityGroupRuleState<'_> {
    fn from(rule: SecurityGroupRule) -> Self {
        Self {
            id: string_value(rule.id),
            security_group_id: rule
                .security_group
                .map_or(Value::Null, |group| string_value(group.id)),
            direction: string_value(rule.direction),
            protocol: string_value(rule.protocol),
            ports: rule.ports.map_or(Value::Null, string_or_null),
            targets: if rule.targets.is_empty() {
                Value::Null
            } else {
                string_set(rule.targets)
            },
            notes: rule.notes.map_or(Value::Null, string_or_null),
        }
    }
}

impl WithSchema for SecurityGroupRulesState<'_> {
    fn schema() -> Schema {
        let rules: HashMap<String, Attribute> = computed_attributes(&RULE_ATTRIBUTES);
        let attribute = |description: &str, attr_type, constraint| Attribute {
            attr_type,
            description: Description::plain(description),
            constraint,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: [
                    (
                        "id",
                        attribute(
                            "ID of the security group",
                            AttributeType::String,
                            AttributeConstraint::Computed,
                        ),
                    ),
                    (
                        "security_group_id",
                        attribute(
                            "ID of the security group to fetch the rules of",
                            AttributeType::String,
                            AttributeConstraint::Required,
                        ),
                    ),
                    (
                        "inbound_rules",
                        attribute(
                            "Inbound rules",
                            AttributeType::AttributeList(rules.clone()),
                            AttributeConstraint::Computed,
                        ),
                    ),
                    (
                        "outbound_rules",
                        attribute(
                            "Outbound rules",
                            AttributeType::AttributeList(rules),
                            AttributeConstraint::Computed,
                        ),
                    ),
                ]
                .into_iter()
                .map(|(name, attribute)| (name.to_owned(), attribute))
                .collect(),
                description: Description::plain("Rules of a security group"),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ObjectRef;

    #[test]
    fn invalid_direction_and_protocol() {
        let mut diags = Diagnostics::default();
        SecurityGroupRuleState {
            direction: Value::from("sideways"),
            protocol: Value::from("tcp"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn flatten_rule() {
        let state = SecurityGroupRuleState::from(SecurityGroupRule {
            id: String::from("sgr_1"),
            security_group: Some(ObjectRef {
                id: String::from("sg_1"),
            }),
            direction: String::from("inbound"),
            protocol: String::from("ICMP"),
            ports: None,
            targets: vec![],
            notes: Some(String::new()),
        });
        assert_eq!(state.security_group_id.as_str(), "sg_1");
        assert!(state.ports.is_null());
        assert!(state.targets.is_null());
        assert!(state.notes.is_null());
        assert_eq!(state.to_rule().direction, "inbound");
    }
}
