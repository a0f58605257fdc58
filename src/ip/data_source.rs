use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::meta::MetaHandle;
use crate::utils::{checked, non_empty};

use super::state::IpState;

#[derive(Debug, Clone, Default)]
pub struct IpDataSource {
    meta: MetaHandle,
}

impl IpDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for IpDataSource {
    type State<'a> = IpState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(IpState::data_source_schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if config.id.is_value() && config.address.is_value() {
            diags.error_short(
                "Only one of `id` and `address` can be set",
                AttributePath::new("address"),
            );
        }
        if config.id.is_null() && config.address.is_null() {
            diags.root_error_short("One of `id` or `address` must be set");
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
        let result = match (non_empty(&config.id), non_empty(&config.address)) {
            (Some(id), _) => meta.client.get_ip_address(&id).await,
            (None, Some(address)) => meta.client.find_ip_address(&address).await,
            (None, None) => {
                diags.root_error_short("One of `id` or `address` must be set");
                return None;
            }
        };
        let ip = checked(diags, "Failed to read IP address", result)?;
        Some(ip.into())
    }
}
