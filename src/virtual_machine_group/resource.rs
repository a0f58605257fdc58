use async_trait::async_trait;
use tracing::info;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::VirtualMachineGroupArguments;
use crate::meta::MetaHandle;
use crate::utils::{bool_or, checked, found, report_api_error, WithSchema};

use super::state::VirtualMachineGroupState;

#[derive(Debug, Clone, Default)]
pub struct VirtualMachineGroupResource {
    meta: MetaHandle,
}

impl VirtualMachineGroupResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl Resource for VirtualMachineGroupResource {
    type State<'a> = VirtualMachineGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachineGroupState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if matches!(&config.name, Value::Value(name) if name.trim().is_empty()) {
            diags.error_short("`name` cannot be empty", AttributePath::new("name"));
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let group = found(
            diags,
            "Failed to read virtual machine group",
            meta.client.get_virtual_machine_group(state.id.as_str()).await,
        )?;
        Some((group.into(), private_state))
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
        if state.segregate.is_null() {
            state.segregate = Value::Value(true);
        }
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        if state.segregate.is_null() {
            state.segregate = Value::Value(true);
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
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let meta = self.meta.get(diags)?;
        let group = checked(
            diags,
            "Failed to create virtual machine group",
            meta.client
                .create_virtual_machine_group(&meta.organization, &planned_state.arguments())
                .await,
        )?;
        info!(id = group.id, "virtual machine group created");

        let group = checked(
            diags,
            "Failed to read virtual machine group",
            meta.client.get_virtual_machine_group(&group.id).await,
        )?;
        Some((group.into(), private_state))
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

        let mut args = VirtualMachineGroupArguments::default();
        if prior_state.name != planned_state.name {
            args.name = Some(planned_state.name.as_str().to_owned());
        }
        if prior_state.segregate != planned_state.segregate {
            args.segregate = Some(bool_or(&planned_state.segregate, true));
        }

        if args != VirtualMachineGroupArguments::default() {
            checked(
                diags,
                "Failed to update virtual machine group",
                meta.client.update_virtual_machine_group(id, &args).await,
            )?;
        }

        let group = checked(
            diags,
            "Failed to read virtual machine group",
            meta.client.get_virtual_machine_group(id).await,
        )?;
        Some((group.into(), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta
            .client
            .delete_virtual_machine_group(state.id.as_str())
            .await
        {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete virtual machine group", &err);
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
        let group = checked(
            diags,
            "Failed to import virtual machine group",
            meta.client.get_virtual_machine_group(&id).await,
        )?;
        Some((group.into(), Default::default()))
    }
}
