use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{DataSource, Diagnostics};

use crate::api::fetch_all;
use crate::meta::MetaHandle;
use crate::utils::{checked, string_value, WithSchema};

use super::state::{LoadBalancerState, LoadBalancersState};

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerDataSource {
    meta: MetaHandle,
}

impl LoadBalancerDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for LoadBalancerDataSource {
    type State<'a> = LoadBalancerState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancerState::data_source_schema())
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
        let lb = checked(
            diags,
            "Failed to read load balancer",
            meta.client.get_load_balancer(config.id.as_str()).await,
        )?;
        Some(lb.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadBalancersDataSource {
    meta: MetaHandle,
}

impl LoadBalancersDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for LoadBalancersDataSource {
    type State<'a> = LoadBalancersState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(LoadBalancersState::schema())
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
        let listed = checked(
            diags,
            "Failed to list load balancers",
            fetch_all(|page| meta.client.list_load_balancers(&meta.organization, page)).await,
        )?;

        // Listed load balancers lack their targets
        let mut load_balancers = Vec::with_capacity(listed.len());
        for lb in listed {
            let lb = checked(
                diags,
                "Failed to read load balancer",
                meta.client.get_load_balancer(&lb.id).await,
            )?;
            load_balancers.push(Value::Value(lb.into()));
        }

        Some(LoadBalancersState {
            id: string_value(meta.organization.to_string()),
            load_balancers: Value::Value(load_balancers),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fake::FakeCore;
    use crate::api::LoadBalancer;
    use crate::meta::tests::handle_with;

    #[tokio::test]
    async fn read_by_id() {
        let fake = Arc::new(FakeCore::default());
        fake.state().load_balancers.insert(
            String::from("lb_1"),
            LoadBalancer {
                id: String::from("lb_1"),
                name: String::from("front"),
                resource_type: String::from("tags"),
                resource_ids: vec![String::from("tag_1")],
                https_redirect: true,
                ..Default::default()
            },
        );
        let data_source = LoadBalancerDataSource::new(handle_with(fake));
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(
                &mut diags,
                LoadBalancerState {
                    id: Value::from("lb_1"),
                    ..Default::default()
                },
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert_eq!(state.name.as_str(), "front");
        assert_eq!(state.https_redirect, Value::Value(true));
        assert!(state.tag_ids.is_value());
        assert!(state.ip_address.is_null());
    }

    #[tokio::test]
    async fn list_reads_every_load_balancer() {
        let fake = Arc::new(FakeCore::default());
        {
            let mut state = fake.state();
            state.page_size = 1;
            for (id, resource_type, target) in
                [("lb_1", "tags", "tag_1"), ("lb_2", "virtual_machines", "vm_1")]
            {
                state.load_balancers.insert(
                    String::from(id),
                    LoadBalancer {
                        id: String::from(id),
                        name: id.replace('_', "-"),
                        resource_type: String::from(resource_type),
                        resource_ids: vec![String::from(target)],
                        ..Default::default()
                    },
                );
            }
        }
        let data_source = LoadBalancersDataSource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(&mut diags, Default::default(), ValueEmpty::Null)
            .await
            .unwrap();
        assert_eq!(state.id.as_str(), "acme");
        let lbs = state
            .load_balancers
            .iter()
            .flatten()
            .filter_map(|lb| lb.as_ref_option())
            .collect::<Vec<_>>();
        assert_eq!(lbs.len(), 2);
        assert_eq!(lbs[0].name.as_str(), "lb-1");
        assert!(lbs[0].tag_ids.is_value());
        assert!(lbs[1].virtual_machine_ids.is_value());
        assert_eq!(
            fake.calls(),
            vec![
                "list_load_balancers acme 1",
                "list_load_balancers acme 2",
                "get_load_balancer lb_1",
                "get_load_balancer lb_2",
            ]
        );
    }
}
