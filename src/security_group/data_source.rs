use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{DataSource, Diagnostics};

use crate::api::{fetch_all, CoreApi, SecurityGroup};
use crate::meta::MetaHandle;
use crate::utils::{bool_or, checked, string_value, WithSchema};

use super::rules::{fetch_rules, split_directions};
use super::state::{SecurityGroupDataState, SecurityGroupsState};

async fn flatten<'a>(
    diags: &mut Diagnostics,
    client: &dyn CoreApi,
    group: SecurityGroup,
    include_rules: bool,
) -> Option<SecurityGroupDataState<'a>> {
    let rules = if include_rules {
        let rules = checked(
            diags,
            "Failed to read security group rules",
            fetch_rules(client, &group.id).await,
        )?;
        Some(split_directions(rules))
    } else {
        None
    };
    Some(SecurityGroupDataState::flatten(group, include_rules, rules))
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupDataSource {
    meta: MetaHandle,
}

impl SecurityGroupDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for SecurityGroupDataSource {
    type State<'a> = SecurityGroupDataState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupDataState::schema())
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
        let client = meta.client.as_ref();
        let group = checked(
            diags,
            "Failed to read security group",
            client.get_security_group(config.id.as_str()).await,
        )?;
        flatten(diags, client, group, bool_or(&config.include_rules, true)).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupsDataSource {
    meta: MetaHandle,
}

impl SecurityGroupsDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for SecurityGroupsDataSource {
    type State<'a> = SecurityGroupsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupsState::schema())
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
        let client = meta.client.as_ref();
        let include_rules = bool_or(&config.include_rules, false);

        let groups = checked(
            diags,
            "Failed to list security groups",
            fetch_all(|page| client.list_security_groups(&meta.organization, page)).await,
        )?;

        let mut security_groups = Vec::with_capacity(groups.len());
        for group in groups {
            let group = flatten(diags, client, group, include_rules).await?;
            security_groups.push(Value::Value(group));
        }

        Some(SecurityGroupsState {
            id: string_value(meta.organization.to_string()),
            include_rules: Value::Value(include_rules),
            security_groups: Value::Value(security_groups),
        })
    }
}
