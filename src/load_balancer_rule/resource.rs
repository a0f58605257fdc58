use async_trait::async_trait;
use tracing::info;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::LoadBalancerRuleArguments;
use crate::meta::MetaHandle;
use crate::utils::{
    checked, found, replace_if_changed, report_api_error, WithSchema, WithValidate,
};

use super::state::LoadBalancerRuleState;

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerRuleResource {
    meta: MetaHandle,
}

impl LoadBalancerRuleResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

/// Case-only changes are not changes
fn suppress_case_diff<'a>(prior: &ValueString<'a>, proposed: &mut ValueString<'a>) {
    let same = matches!(
        (prior, &*proposed),
        (Value::Value(prior), Value::Value(value)) if prior.eq_ignore_ascii_case(value)
    );
    if same {
        *proposed = prior.clone();
    }
}

#[async_trait]
impl Resource for LoadBalancerRuleResource {
    type State<'a> = LoadBalancerRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancerRuleState::schema())
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
            "Failed to read load balancer rule",
            meta.client.get_load_balancer_rule(state.id.as_str()).await,
        )?;
        Some((LoadBalancerRuleState::flatten(rule, &state), private_state))
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
        state.apply_defaults();
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
        let mut state = proposed_state;
        state.apply_defaults();
        suppress_case_diff(&prior_state.algorithm, &mut state.algorithm);
        suppress_case_diff(&prior_state.protocol, &mut state.protocol);
        if let (Value::Value(prior), Value::Value(check)) =
            (&prior_state.healthcheck, &mut state.healthcheck)
        {
            suppress_case_diff(&prior.protocol, &mut check.protocol);
        }

        let mut triggers = Vec::new();
        replace_if_changed(
            &mut triggers,
            "load_balancer_id",
            &prior_state.load_balancer_id,
            &state.load_balancer_id,
        );
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
        let load_balancer_id = planned_state.load_balancer_id.as_str();
        let rule = checked(
            diags,
            "Failed to create load balancer rule",
            meta.client
                .create_load_balancer_rule(load_balancer_id, &planned_state.arguments(None))
                .await,
        )?;
        info!(id = rule.id, load_balancer_id, "load balancer rule created");

        let rule = checked(
            diags,
            "Failed to read load balancer rule",
            meta.client.get_load_balancer_rule(&rule.id).await,
        )?;
        Some((
            LoadBalancerRuleState::flatten(rule, &planned_state),
            private_state,
        ))
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

        let args = planned_state.arguments(Some(&prior_state));
        if args != LoadBalancerRuleArguments::default() {
            checked(
                diags,
                "Failed to update load balancer rule",
                meta.client.update_load_balancer_rule(id, &args).await,
            )?;
        }

        let rule = checked(
            diags,
            "Failed to read load balancer rule",
            meta.client.get_load_balancer_rule(id).await,
        )?;
        Some((
            LoadBalancerRuleState::flatten(rule, &planned_state),
            private_state,
        ))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta.client.delete_load_balancer_rule(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete load balancer rule", &err);
                None
            }
        }
    }

    /// The load balancer of an imported rule is not returned by the API
    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let rule = checked(
            diags,
            "Failed to import load balancer rule",
            meta.client.get_load_balancer_rule(&id).await,
        )?;
        Some((
            LoadBalancerRuleState::flatten(rule, &Default::default()),
            Default::default(),
        ))
    }
}
