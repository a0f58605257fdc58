use async_trait::async_trait;
use tracing::info;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::SecurityGroupRule;
use crate::meta::MetaHandle;
use crate::utils::{checked, found, replace_if_changed, report_api_error, WithSchema, WithValidate};

use super::state::SecurityGroupRuleState;

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupRuleResource {
    meta: MetaHandle,
}

impl SecurityGroupRuleResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

/// State of a rule read from the API, keeping the known security group if the API omits it
fn flatten<'a>(rule: SecurityGroupRule, prior: &SecurityGroupRuleState<'a>) -> SecurityGroupRuleState<'a> {
    let mut state = SecurityGroupRuleState::from(rule);
    if state.security_group_id.is_null() {
        state.security_group_id = prior.security_group_id.clone();
    }
    state
}

#[async_trait]
impl Resource for SecurityGroupRuleResource {
    type State<'a> = SecurityGroupRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupRuleState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let rule = found(
            diags,
            "Failed to read security group rule",
            meta.client.get_security_group_rule(state.id.as_str()).await,
        )?;
        Some((flatten(rule, &state), private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut triggers = Vec::new();
        replace_if_changed(
            &mut triggers,
            "security_group_id",
            &prior_state.security_group_id,
            &proposed_state.security_group_id,
        );
        replace_if_changed(
            &mut triggers,
            "direction",
            &prior_state.direction,
            &proposed_state.direction,
        );

        let mut state = proposed_state;
        if !triggers.is_empty() {
            state.id = Value::Unknown;
        }
        Some((state, prior_private_state, triggers))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let security_group_id = planned_state.security_group_id.as_str();
        let rule = checked(
            diags,
            "Failed to create security group rule",
            meta.client
                .create_security_group_rule(security_group_id, &planned_state.to_rule().arguments(true))
                .await,
        )?;
        info!(id = rule.id, security_group_id, "security group rule created");

        let rule = checked(
            diags,
            "Failed to read security group rule",
            meta.client.get_security_group_rule(&rule.id).await,
        )?;
        Some((flatten(rule, &planned_state), private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let id = prior_state.id.as_str();

        let rule = planned_state.to_rule();
        if !prior_state.to_rule().same_fields(&rule) {
            checked(
                diags,
                "Failed to update security group rule",
                meta.client
                    .update_security_group_rule(id, &rule.arguments(false))
                    .await,
            )?;
        }

        let rule = checked(
            diags,
            "Failed to read security group rule",
            meta.client.get_security_group_rule(id).await,
        )?;
        Some((flatten(rule, &planned_state), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta.client.delete_security_group_rule(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete security group rule", &err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let rule = checked(
            diags,
            "Failed to import security group rule",
            meta.client.get_security_group_rule(&id).await,
        )?;
        Some((rule.into(), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fake::FakeCore;
    use crate::api::{CoreApi, Lookup, SecurityGroupArguments};
    use crate::meta::tests::handle_with;
    use crate::utils::string_set;

    async fn group(fake: &FakeCore) -> String {
        fake.create_security_group(
            &Lookup::organization("acme"),
            &SecurityGroupArguments {
                name: Some(String::from("web")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    fn config<'a>(security_group_id: &'a str, ports: &'a str) -> SecurityGroupRuleState<'a> {
        SecurityGroupRuleState {
            security_group_id: Value::from(security_group_id),
            direction: Value::from("inbound"),
            protocol: Value::from("TCP"),
            ports: Value::from(ports),
            targets: string_set(["all:ipv4"]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_update_delete() {
        let fake = Arc::new(FakeCore::default());
        let security_group_id = group(&fake).await;
        let resource = SecurityGroupRuleResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let (planned, private) = resource
            .plan_create(
                &mut diags,
                config(&security_group_id, "22"),
                config(&security_group_id, "22"),
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        let (state, private) = resource
            .create(
                &mut diags,
                planned,
                config(&security_group_id, "22"),
                private,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.security_group_id.as_str(), security_group_id);
        assert_eq!(state.ports.as_str(), "22");

        let planned = SecurityGroupRuleState {
            ports: Value::from("22,722"),
            ..state.clone()
        };
        let (updated, private) = resource
            .update(
                &mut diags,
                state.clone(),
                planned.clone(),
                planned,
                private,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert_eq!(updated.ports.as_str(), "22,722");
        assert!(fake
            .mutations()
            .contains(&format!("update_security_group_rule {}", state.id.as_str())));

        resource
            .destroy(&mut diags, updated.clone(), private, ValueEmpty::Null)
            .await
            .unwrap();
        let read = resource
            .read(&mut diags, updated, ValueEmpty::Null, ValueEmpty::Null)
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn direction_change_replaces() {
        let resource = SecurityGroupRuleResource::default();
        let mut diags = Diagnostics::default();

        let prior = SecurityGroupRuleState {
            id: Value::from("sgr_1"),
            ..config("sg_1", "22")
        };
        let proposed = SecurityGroupRuleState {
            direction: Value::from("outbound"),
            ..prior.clone()
        };
        let (planned, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert_eq!(triggers, vec![AttributePath::new("direction")]);
        assert!(planned.id.is_unknown());
    }

    #[tokio::test]
    async fn target_order_does_not_update() {
        let fake = Arc::new(FakeCore::default());
        let security_group_id = group(&fake).await;
        let resource = SecurityGroupRuleResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let created = SecurityGroupRuleState {
            targets: string_set(["10.0.0.1", "10.0.0.2"]),
            ..config(&security_group_id, "53")
        };
        let (state, _) = resource
            .create(
                &mut diags,
                created.clone(),
                created,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        let reordered = SecurityGroupRuleState {
            targets: string_set(["10.0.0.2", "10.0.0.1"]),
            ..state.clone()
        };
        resource
            .update(
                &mut diags,
                state,
                reordered.clone(),
                reordered,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert!(!fake
            .mutations()
            .iter()
            .any(|call| call.starts_with("update_security_group_rule")));
    }
}
