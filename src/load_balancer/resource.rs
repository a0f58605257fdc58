use async_trait::async_trait;
use tracing::info;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::LoadBalancerArguments;
use crate::meta::MetaHandle;
use crate::utils::{checked, found, report_api_error, WithSchema, WithValidate};

use super::state::LoadBalancerState;

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerResource {
    meta: MetaHandle,
}

impl LoadBalancerResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl Resource for LoadBalancerResource {
    type State<'a> = LoadBalancerState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancerState::schema())
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
        let lb = found(
            diags,
            "Failed to read load balancer",
            meta.client.get_load_balancer(state.id.as_str()).await,
        )?;
        Some((lb.into(), private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.mark_computed_unknown();
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
        if state.targets_changed(&prior_state) {
            state.resource_type = Value::Value(state.resource_type_and_ids().0.into());
        }
        Some((state, prior_private_state, vec![]))
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
        config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let (resource_type, resource_ids) = planned_state.resource_type_and_ids();
        let args = LoadBalancerArguments {
            name: Some(meta.use_or_generate_name(config_state.name.as_deref_option().unwrap_or_default())),
            resource_type: Some(resource_type),
            resource_ids: Some(resource_ids),
        };

        let lb = checked(
            diags,
            "Failed to create load balancer",
            meta.client
                .create_load_balancer(&meta.organization, &meta.data_center, &args)
                .await,
        )?;
        info!(id = lb.id, name = lb.name, "load balancer created");

        let lb = checked(
            diags,
            "Failed to read load balancer",
            meta.client.get_load_balancer(&lb.id).await,
        )?;
        Some((lb.into(), private_state))
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

        let mut args = LoadBalancerArguments::default();
        if prior_state.name != planned_state.name {
            args.name = planned_state.name.as_deref_option().map(str::to_owned);
        }
        if planned_state.targets_changed(&prior_state) {
            let (resource_type, resource_ids) = planned_state.resource_type_and_ids();
            args.resource_type = Some(resource_type);
            args.resource_ids = Some(resource_ids);
        }

        if args != LoadBalancerArguments::default() {
            checked(
                diags,
                "Failed to update load balancer",
                meta.client.update_load_balancer(id, &args).await,
            )?;
        }

        let lb = checked(
            diags,
            "Failed to read load balancer",
            meta.client.get_load_balancer(id).await,
        )?;
        Some((lb.into(), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta.client.delete_load_balancer(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete load balancer", &err);
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
        let lb = checked(
            diags,
            "Failed to import load balancer",
            meta.client.get_load_balancer(&id).await,
        )?;
        Some((lb.into(), Default::default()))
    }
}
