use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{DataSource, Diagnostics};

use crate::api::fetch_all;
use crate::meta::MetaHandle;
use crate::utils::{checked, string_value, WithSchema};

use super::state::{LoadBalancerRuleDataState, LoadBalancerRulesState};

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerRuleDataSource {
    meta: MetaHandle,
}

impl LoadBalancerRuleDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for LoadBalancerRuleDataSource {
    type State<'a> = LoadBalancerRuleDataState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancerRuleDataState::data_source_schema())
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
        let rule = checked(
            diags,
            "Failed to read load balancer rule",
            meta.client.get_load_balancer_rule(config.id.as_str()).await,
        )?;
        // The API does not say which load balancer a rule belongs to
        Some(LoadBalancerRuleDataState::from_rule(rule, Value::Null))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerRulesDataSource {
    meta: MetaHandle,
}

impl LoadBalancerRulesDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for LoadBalancerRulesDataSource {
    type State<'a> = LoadBalancerRulesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancerRulesState::schema())
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
        let load_balancer_id = config.load_balancer_id.as_str();
        let listed = checked(
            diags,
            "Failed to list load balancer rules",
            fetch_all(|page| meta.client.list_load_balancer_rules(load_balancer_id, page)).await,
        )?;

        // Listed rules only carry their id
        let mut rules = Vec::with_capacity(listed.len());
        for rule in listed {
            let rule = checked(
                diags,
                "Failed to read load balancer rule",
                meta.client.get_load_balancer_rule(&rule.id).await,
            )?;
            rules.push(Value::Value(LoadBalancerRuleDataState::from_rule(
                rule,
                string_value(load_balancer_id),
            )));
        }

        Some(LoadBalancerRulesState {
            id: string_value(load_balancer_id),
            rules: Value::Value(rules),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fake::FakeCore;
    use crate::api::{LoadBalancer, LoadBalancerRule};
    use crate::meta::tests::handle_with;

    fn seeded() -> Arc<FakeCore> {
        let fake = Arc::new(FakeCore::default());
        {
            let mut state = fake.state();
            for lb_id in ["lb_1", "lb_2"] {
                state.load_balancers.insert(
                    String::from(lb_id),
                    LoadBalancer {
                        id: String::from(lb_id),
                        ..Default::default()
                    },
                );
            }
            for (id, lb_id, listen_port) in
                [("lbrule_1", "lb_1", 80), ("lbrule_2", "lb_2", 443), ("lbrule_3", "lb_1", 8080)]
            {
                state.load_balancer_rules.insert(
                    String::from(id),
                    (
                        String::from(lb_id),
                        LoadBalancerRule {
                            id: String::from(id),
                            algorithm: String::from("round_robin"),
                            protocol: String::from("HTTP"),
                            listen_port,
                            destination_port: 8000,
                            check_enabled: listen_port == 80,
                            check_protocol: String::from("HTTP"),
                            check_path: String::from("/health"),
                            ..Default::default()
                        },
                    ),
                );
            }
        }
        fake
    }

    #[tokio::test]
    async fn single_rule_by_id() {
        let data_source = LoadBalancerRuleDataSource::new(handle_with(seeded()));
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(
                &mut diags,
                LoadBalancerRuleDataState {
                    id: Value::from("lbrule_2"),
                    ..Default::default()
                },
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert_eq!(state.listen_port, Value::Value(443));
        assert!(state.load_balancer_id.is_null());
        let check = state.healthcheck.as_ref_option().unwrap();
        assert_eq!(check.enabled, Value::Value(false));
        assert_eq!(check.path.as_str(), "/health");
    }

    #[tokio::test]
    async fn rules_of_one_load_balancer() {
        let fake = seeded();
        let data_source = LoadBalancerRulesDataSource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(
                &mut diags,
                LoadBalancerRulesState {
                    load_balancer_id: Value::from("lb_1"),
                    ..Default::default()
                },
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.id.as_str(), "lb_1");
        let rules = state
            .rules
            .iter()
            .flatten()
            .filter_map(|rule| rule.as_ref_option())
            .collect::<Vec<_>>();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].listen_port, Value::Value(80));
        assert_eq!(rules[1].listen_port, Value::Value(8080));
        assert!(rules.iter().all(|rule| rule.load_balancer_id.as_str() == "lb_1"));
        assert_eq!(
            fake.calls(),
            vec![
                "list_load_balancer_rules lb_1 1",
                "get_load_balancer_rule lbrule_1",
                "get_load_balancer_rule lbrule_3",
            ]
        );
    }

    #[tokio::test]
    async fn rules_of_missing_load_balancer_is_an_error() {
        let data_source = LoadBalancerRulesDataSource::new(handle_with(seeded()));
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(
                &mut diags,
                LoadBalancerRulesState {
                    load_balancer_id: Value::from("lb_missing"),
                    ..Default::default()
                },
                ValueEmpty::Null,
            )
            .await;
        assert!(state.is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
