use async_trait::async_trait;
use tracing::info;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::{IpAddressArguments, IpAddressUpdate};
use crate::meta::MetaHandle;
use crate::utils::{
    bool_or, checked, found, non_empty, replace_if_changed, report_api_error, WithSchema,
    WithValidate,
};

use super::state::IpState;

#[derive(Debug, Clone, Default)]
pub struct IpResource {
    meta: MetaHandle,
}

impl IpResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl Resource for IpResource {
    type State<'a> = IpState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(IpState::schema())
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
        let ip = found(
            diags,
            "Failed to read IP address",
            meta.client.get_ip_address(state.id.as_str()).await,
        )?;
        Some((ip.into(), private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.apply_defaults();
        state.mark_computed_unknown();
        if state.label.is_null() {
            state.label = Value::Unknown;
        }
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.apply_defaults();

        let mut triggers = Vec::new();
        if config_state.network_id.is_value() {
            replace_if_changed(
                &mut triggers,
                "network_id",
                &prior_state.network_id,
                &state.network_id,
            );
        } else {
            state.network_id = prior_state.network_id.clone();
        }
        replace_if_changed(&mut triggers, "version", &prior_state.version, &state.version);

        if !triggers.is_empty() {
            state.mark_computed_unknown();
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
        config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;

        let network_id = match non_empty(&config_state.network_id) {
            Some(network_id) => network_id,
            None => {
                checked(
                    diags,
                    "Failed to find the default network",
                    meta.client.get_default_network(&meta.data_center).await,
                )?
                .id
            }
        };

        let args = IpAddressArguments {
            network_id,
            version: planned_state.ip_version(),
            vip: Some(bool_or(&planned_state.vip, false)),
            label: non_empty(&config_state.label),
        };
        let ip = checked(
            diags,
            "Failed to create IP address",
            meta.client
                .create_ip_address(&meta.organization, &args)
                .await,
        )?;
        info!(id = ip.id, address = ip.address, "IP address created");

        let ip = checked(
            diags,
            "Failed to read IP address",
            meta.client.get_ip_address(&ip.id).await,
        )?;
        Some((ip.into(), private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let id = prior_state.id.as_str();

        let mut args = IpAddressUpdate::default();
        if prior_state.vip != planned_state.vip {
            args.vip = Some(bool_or(&planned_state.vip, false));
        }
        if config_state.label.is_value() && prior_state.label != config_state.label {
            args.label = non_empty(&config_state.label);
        }

        if args != IpAddressUpdate::default() {
            checked(
                diags,
                "Failed to update IP address",
                meta.client.update_ip_address(id, &args).await,
            )?;
        }

        let ip = checked(
            diags,
            "Failed to read IP address",
            meta.client.get_ip_address(id).await,
        )?;
        Some((ip.into(), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta.client.delete_ip_address(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete IP address", &err);
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
        let ip = checked(
            diags,
            "Failed to import IP address",
            meta.client.get_ip_address(&id).await,
        )?;
        Some((ip.into(), Default::default()))
    }
}
