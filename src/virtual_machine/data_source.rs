use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::meta::MetaHandle;
use crate::utils::{checked, non_empty};

use super::resource::interfaces;
use super::state::VirtualMachineState;

#[derive(Debug, Clone, Default)]
pub struct VirtualMachineDataSource {
    meta: MetaHandle,
}

impl VirtualMachineDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for VirtualMachineDataSource {
    type State<'a> = VirtualMachineState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachineState::data_source_schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_value() && config.fqdn.is_value() {
            diags.error_short(
                "Only one of `id` and `fqdn` can be set",
                AttributePath::new("fqdn"),
            );
        }
        if config.id.is_null() && config.fqdn.is_null() {
            diags.root_error_short("One of `id` or `fqdn` must be set");
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags)?;
        let client = meta.client.as_ref();
        let result = match (non_empty(&config.id), non_empty(&config.fqdn)) {
            (Some(id), _) => client.get_virtual_machine(&id).await,
            (None, Some(fqdn)) => client.find_virtual_machine(&fqdn).await,
            (None, None) => {
                diags.root_error_short("One of `id` or `fqdn` must be set");
                return None;
            }
        };
        let vm = checked(diags, "Failed to read virtual machine", result)?;
        let ifaces = checked(
            diags,
            "Failed to read virtual machine network interfaces",
            interfaces(client, &vm.id).await,
        )?;
        Some(VirtualMachineState::flatten(vm, ifaces, &Default::default()))
    }
}
