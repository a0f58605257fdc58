use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{DataSource, Diagnostics};

use crate::api::fetch_all;
use crate::meta::MetaHandle;
use crate::utils::{checked, string_value, WithSchema};

use super::state::{VirtualMachineGroupState, VirtualMachineGroupsState};

#[derive(Debug, Clone, Default)]
pub struct VirtualMachineGroupDataSource {
    meta: MetaHandle,
}

impl VirtualMachineGroupDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for VirtualMachineGroupDataSource {
    type State<'a> = VirtualMachineGroupState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachineGroupState::data_source_schema())
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
        let group = checked(
            diags,
            "Failed to read virtual machine group",
            meta.client
                .get_virtual_machine_group(config.id.as_str())
                .await,
        )?;
        Some(group.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualMachineGroupsDataSource {
    meta: MetaHandle,
}

impl VirtualMachineGroupsDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for VirtualMachineGroupsDataSource {
    type State<'a> = VirtualMachineGroupsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachineGroupsState::schema())
    }

    async fn validate<'a>(&self, _diags: &mut Diagnostics, _config: Self::State<'a>) -> Option<()> {
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        _config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags)?;
        let groups = checked(
            diags,
            "Failed to list virtual machine groups",
            fetch_all(|page| {
                meta.client
                    .list_virtual_machine_groups(&meta.organization, page)
            })
            .await,
        )?;

        Some(VirtualMachineGroupsState {
            id: string_value(meta.organization.to_string()),
            groups: Value::Value(
                groups
                    .into_iter()
                    .map(|group| Value::Value(group.into()))
                    .collect(),
            ),
        })
    }
}
