use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::{LoadBalancerRule, LoadBalancerRuleArguments, ObjectRef};
use crate::utils::{
    bool_or, data_source_block, list_data_source_schema, number_or, set_strings, string_set,
    string_value, WithSchema, WithValidate,
};

pub const ALGORITHMS: &[&str] = &["round_robin", "least_connections", "sticky"];
pub const PROTOCOLS: &[&str] = &["HTTP", "HTTPS", "TCP"];
pub const CHECK_PROTOCOLS: &[&str] = &["HTTP", "TCP"];

pub const DEFAULT_ALGORITHM: &str = "round_robin";
const DEFAULT_CHECK_PROTOCOL: &str = "HTTP";
const DEFAULT_CHECK_PATH: &str = "/";
const DEFAULT_CHECK_INTERVAL: i64 = 20;
const DEFAULT_CHECK_HEALTHY: i64 = 2;
const DEFAULT_CHECK_UNHEALTHY: i64 = 2;
const DEFAULT_CHECK_TIMEOUT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HealthcheckState<'a> {
    pub enabled: ValueBool,
    #[serde(borrow = "'a")]
    pub protocol: ValueString<'a>,
    pub path: ValueString<'a>,
    pub interval: ValueNumber,
    pub healthy: ValueNumber,
    pub unhealthy: ValueNumber,
    pub timeout: ValueNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancerRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub load_balancer_id: ValueString<'a>,
    pub algorithm: ValueString<'a>,
    pub destination_port: ValueNumber,
    pub listen_port: ValueNumber,
    pub protocol: ValueString<'a>,
    pub proxy_protocol: ValueBool,
    pub certificate_ids: ValueSet<ValueString<'a>>,
    pub backend_ssl: ValueBool,
    pub passthrough_ssl: ValueBool,
    #[serde(with = "value::serde_as_vec")]
    pub healthcheck: Value<HealthcheckState<'a>>,
}

/// Rule as read by the data sources, where `healthcheck` is a computed attribute
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancerRuleDataState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub load_balancer_id: ValueString<'a>,
    pub algorithm: ValueString<'a>,
    pub destination_port: ValueNumber,
    pub listen_port: ValueNumber,
    pub protocol: ValueString<'a>,
    pub proxy_protocol: ValueBool,
    pub certificate_ids: ValueSet<ValueString<'a>>,
    pub backend_ssl: ValueBool,
    pub passthrough_ssl: ValueBool,
    pub healthcheck: Value<HealthcheckState<'a>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancerRulesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub load_balancer_id: ValueString<'a>,
    pub rules: ValueList<Value<LoadBalancerRuleDataState<'a>>>,
}

fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

lazy_static! {
    static ref SCHEMA: Schema = Schema {
        version: 1,
        block: Block {
            version: 1,
            attributes: map! {
                "id" => attribute(AttributeType::String, AttributeConstraint::Computed, "ID of the rule"),
                "load_balancer_id" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "ID of the load balancer to create the rule on",
                ),
                "algorithm" => attribute(
                    AttributeType::String,
                    AttributeConstraint::OptionalComputed,
                    "Algorithm distributing the traffic between targets, one of `round_robin`, `least_connections` or `sticky` (default: `round_robin`)",
                ),
                "destination_port" => attribute(
                    AttributeType::Number,
                    AttributeConstraint::Required,
                    "Port on the virtual machines the traffic is sent to",
                ),
                "listen_port" => attribute(
                    AttributeType::Number,
                    AttributeConstraint::Required,
                    "Port publicly available on the IP address of the load balancer",
                ),
                "protocol" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Network protocol, one of `HTTP`, `HTTPS` or `TCP`",
                ),
                "proxy_protocol" => attribute(
                    AttributeType::Bool,
                    AttributeConstraint::OptionalComputed,
                    "Use the PROXY protocol (default: false)",
                ),
                "certificate_ids" => attribute(
                    AttributeType::Set(AttributeType::String.into()),
                    AttributeConstraint::Optional,
                    "Certificates used for HTTPS",
                ),
                "backend_ssl" => attribute(
                    AttributeType::Bool,
                    AttributeConstraint::OptionalComputed,
                    "Use SSL between the load balancer and the targets (default: false)",
                ),
                "passthrough_ssl" => attribute(
                    AttributeType::Bool,
                    AttributeConstraint::OptionalComputed,
                    "Pass SSL traffic through to the targets (default: false)",
                ),
            },
            blocks: map! {
                "healthcheck" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "enabled" => attribute(
                            AttributeType::Bool,
                            AttributeConstraint::OptionalComputed,
                            "Enable the health check (default: false)",
                        ),
                        "protocol" => attribute(
                            AttributeType::String,
                            AttributeConstraint::OptionalComputed,
                            "Protocol of the check, `HTTP` or `TCP` (default: `HTTP`)",
                        ),
                        "path" => attribute(
                            AttributeType::String,
                            AttributeConstraint::OptionalComputed,
                            "HTTP request path of the check (default: `/`)",
                        ),
                        "interval" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::OptionalComputed,
                            "Seconds between two checks (default: 20)",
                        ),
                        "healthy" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::OptionalComputed,
                            "Consecutive successes before a target is healthy (default: 2)",
                        ),
                        "unhealthy" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::OptionalComputed,
                            "Consecutive failures before a target is unhealthy (default: 2)",
                        ),
                        "timeout" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::OptionalComputed,
                            "Seconds to wait for a check to succeed (default: 5)",
                        ),
                    },
                    description: Description::plain(
                        "Monitor the health of the targets so only healthy ones receive traffic",
                    ),
                    ..Default::default()
                }),
            },
            description: Description::plain("Katapult load balancer rule"),
            ..Default::default()
        },
    };
}

impl WithSchema for LoadBalancerRuleState<'_> {
    fn schema() -> Schema {
        SCHEMA.clone()
    }
}

impl<'a> LoadBalancerRuleDataState<'a> {
    pub fn data_source_schema() -> Schema {
        let mut block = data_source_block(&SCHEMA.block, &[]);
        if let Some(id) = block.attributes.get_mut("id") {
            id.constraint = AttributeConstraint::Required;
        }
        Schema { version: 1, block }
    }

    /// State of `rule`, with its healthcheck whether enabled or not
    pub fn from_rule(rule: LoadBalancerRule, load_balancer_id: ValueString<'a>) -> Self {
        let prior = LoadBalancerRuleState {
            load_balancer_id,
            certificate_ids: Value::Value(Default::default()),
            healthcheck: Value::Value(Default::default()),
            ..Default::default()
        };
        let state = LoadBalancerRuleState::flatten(rule, &prior);
        Self {
            id: state.id,
            load_balancer_id: state.load_balancer_id,
            algorithm: state.algorithm,
            destination_port: state.destination_port,
            listen_port: state.listen_port,
            protocol: state.protocol,
            proxy_protocol: state.proxy_protocol,
            certificate_ids: state.certificate_ids,
            backend_ssl: state.backend_ssl,
            passthrough_ssl: state.passthrough_ssl,
            healthcheck: state.healthcheck,
        }
    }
}

impl WithSchema for LoadBalancerRulesState<'_> {
    fn schema() -> Schema {
        let mut schema = list_data_source_schema(
            "rules",
            &SCHEMA.block,
            "Rules of the load balancer",
        );
        let attributes = &mut schema.block.attributes;
        if let Some(id) = attributes.get_mut("id") {
            id.description = Description::plain("ID of the load balancer");
        }
        attributes.insert(
            String::from("load_balancer_id"),
            attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "ID of the load balancer to fetch the rules of",
            ),
        );
        schema
    }
}

/// Canonical spelling of `value` among `allowed`, ignoring case
pub fn normalize(value: &str, allowed: &[&'static str]) -> Option<&'static str> {
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value))
        .copied()
}

fn check_one_of(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    allowed: &[&'static str],
    attr_path: AttributePath,
) {
    if let Value::Value(value) = value {
        if normalize(value, allowed).is_none() {
            diags.error(
                "Unsupported value",
                format!("`{value}` must be one of: {}", allowed.join(", ")),
                attr_path,
            );
        }
    }
}

fn check_port(diags: &mut Diagnostics, value: &ValueNumber, attr_path: AttributePath) {
    if let Value::Value(port) = value {
        if !(0..=65535).contains(port) {
            diags.error(
                "Invalid port",
                format!("port must be between 0 and 65535, got {port}"),
                attr_path,
            );
        }
    }
}

impl WithValidate for LoadBalancerRuleState<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.algorithm,
            ALGORITHMS,
            attr_path.clone().attribute("algorithm"),
        );
        check_one_of(
            diags,
            &self.protocol,
            PROTOCOLS,
            attr_path.clone().attribute("protocol"),
        );
        check_port(
            diags,
            &self.destination_port,
            attr_path.clone().attribute("destination_port"),
        );
        check_port(
            diags,
            &self.listen_port,
            attr_path.clone().attribute("listen_port"),
        );
        if let Value::Value(check) = &self.healthcheck {
            check_one_of(
                diags,
                &check.protocol,
                CHECK_PROTOCOLS,
                attr_path.attribute("healthcheck").attribute("protocol"),
            );
        }
    }
}

/// Keep the prior spelling when the server only changed the case
fn keep_case<'a>(prior: &ValueString<'a>, server: String) -> ValueString<'a> {
    match prior {
        Value::Value(prior) if prior.eq_ignore_ascii_case(&server) => Value::Value(prior.clone()),
        _ => string_value(server),
    }
}

impl<'a> HealthcheckState<'a> {
    pub fn apply_defaults(&mut self) {
        if self.enabled.is_null() {
            self.enabled = Value::Value(false);
        }
        if self.protocol.is_null() {
            self.protocol = Value::from(DEFAULT_CHECK_PROTOCOL);
        }
        if self.path.is_null() {
            self.path = Value::from(DEFAULT_CHECK_PATH);
        }
        for (value, default) in [
            (&mut self.interval, DEFAULT_CHECK_INTERVAL),
            (&mut self.healthy, DEFAULT_CHECK_HEALTHY),
            (&mut self.unhealthy, DEFAULT_CHECK_UNHEALTHY),
            (&mut self.timeout, DEFAULT_CHECK_TIMEOUT),
        ] {
            if value.is_null() {
                *value = Value::Value(default);
            }
        }
    }

    fn flatten(rule: &LoadBalancerRule, prior: Option<&Self>) -> Self {
        let prior_protocol = prior.map_or(Value::Null, |prior| prior.protocol.clone());
        Self {
            enabled: Value::Value(rule.check_enabled),
            protocol: keep_case(&prior_protocol, rule.check_protocol.clone()),
            path: string_value(rule.check_path.clone()),
            interval: Value::Value(rule.check_interval),
            healthy: Value::Value(rule.check_rise),
            unhealthy: Value::Value(rule.check_fall),
            timeout: Value::Value(rule.check_timeout),
        }
    }
}

impl<'a> LoadBalancerRuleState<'a> {
    pub fn apply_defaults(&mut self) {
        if self.algorithm.is_null() {
            self.algorithm = Value::from(DEFAULT_ALGORITHM);
        }
        for value in [
            &mut self.proxy_protocol,
            &mut self.backend_ssl,
            &mut self.passthrough_ssl,
        ] {
            if value.is_null() {
                *value = Value::Value(false);
            }
        }
        if let Value::Value(check) = &mut self.healthcheck {
            check.apply_defaults();
        }
    }

    /// Arguments of the fields that differ from `prior`, or of every field without `prior`
    pub fn arguments(&self, prior: Option<&Self>) -> LoadBalancerRuleArguments {
        let mut args = LoadBalancerRuleArguments::default();

        if prior.map_or(true, |prior| prior.algorithm != self.algorithm) {
            args.algorithm = self
                .algorithm
                .as_deref_option()
                .and_then(|algorithm| normalize(algorithm, ALGORITHMS))
                .map(str::to_owned);
        }
        if prior.map_or(true, |prior| prior.destination_port != self.destination_port) {
            args.destination_port = self.destination_port.as_ref_option().copied();
        }
        if prior.map_or(true, |prior| prior.listen_port != self.listen_port) {
            args.listen_port = self.listen_port.as_ref_option().copied();
        }
        if prior.map_or(true, |prior| prior.protocol != self.protocol) {
            args.protocol = self
                .protocol
                .as_deref_option()
                .and_then(|protocol| normalize(protocol, PROTOCOLS))
                .map(str::to_owned);
        }
        if prior.map_or(true, |prior| prior.proxy_protocol != self.proxy_protocol) {
            args.proxy_protocol = Some(bool_or(&self.proxy_protocol, false));
        }
        if prior.map_or(true, |prior| prior.backend_ssl != self.backend_ssl) {
            args.backend_ssl = Some(bool_or(&self.backend_ssl, false));
        }
        if prior.map_or(true, |prior| prior.passthrough_ssl != self.passthrough_ssl) {
            args.passthrough_ssl = Some(bool_or(&self.passthrough_ssl, false));
        }

        let certificates = set_strings(&self.certificate_ids);
        let certificates_changed = match prior {
            Some(prior) => set_strings(&prior.certificate_ids) != certificates,
            None => !certificates.is_empty(),
        };
        if certificates_changed {
            args.certificates = Some(
                certificates
                    .into_iter()
                    .map(|id| ObjectRef { id })
                    .collect(),
            );
        }

        let healthcheck_changed = match prior {
            Some(prior) => prior.healthcheck != self.healthcheck,
            None => self.healthcheck.is_value(),
        };
        if healthcheck_changed {
            let mut check = self.healthcheck.clone().unwrap_or_default();
            check.apply_defaults();
            args.check_enabled = Some(bool_or(&check.enabled, false));
            args.check_protocol = check
                .protocol
                .as_deref_option()
                .and_then(|protocol| normalize(protocol, CHECK_PROTOCOLS))
                .map(str::to_owned);
            args.check_path = check.path.as_deref_option().map(str::to_owned);
            args.check_interval = Some(number_or(&check.interval, DEFAULT_CHECK_INTERVAL));
            args.check_rise = Some(number_or(&check.healthy, DEFAULT_CHECK_HEALTHY));
            args.check_fall = Some(number_or(&check.unhealthy, DEFAULT_CHECK_UNHEALTHY));
            args.check_timeout = Some(number_or(&check.timeout, DEFAULT_CHECK_TIMEOUT));
        }

        args
    }

    /// State of `rule`, keeping what the API does not return from `prior`
    pub fn flatten(rule: LoadBalancerRule, prior: &Self) -> Self {
        let healthcheck = if rule.check_enabled || prior.healthcheck.is_value() {
            Value::Value(HealthcheckState::flatten(
                &rule,
                prior.healthcheck.as_ref_option(),
            ))
        } else {
            Value::Null
        };
        let certificate_ids = if rule.certificates.is_empty() && prior.certificate_ids.is_null() {
            Value::Null
        } else {
            string_set(rule.certificates.into_iter().map(|certificate| certificate.id))
        };

        Self {
            id: string_value(rule.id),
            load_balancer_id: prior.load_balancer_id.clone(),
            algorithm: keep_case(&prior.algorithm, rule.algorithm),
            destination_port: Value::Value(rule.destination_port),
            listen_port: Value::Value(rule.listen_port),
            protocol: keep_case(&prior.protocol, rule.protocol),
            proxy_protocol: Value::Value(rule.proxy_protocol),
            certificate_ids,
            backend_ssl: Value::Value(rule.backend_ssl),
            passthrough_ssl: Value::Value(rule.passthrough_ssl),
            healthcheck,
        }
    }
}
