use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{DataSource, Diagnostics};

use crate::meta::MetaHandle;
use crate::security_group::rules::{fetch_rules, split_directions};
use crate::security_group::state::rule_list;
use crate::utils::{checked, string_value, WithSchema};

use super::state::{SecurityGroupRuleState, SecurityGroupRulesState};

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupRuleDataSource {
    meta: MetaHandle,
}

impl SecurityGroupRuleDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for SecurityGroupRuleDataSource {
    type State<'a> = SecurityGroupRuleState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupRuleState::data_source_schema())
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
        let rule = checked(
            diags,
            "Failed to read security group rule",
            meta.client.get_security_group_rule(config.id.as_str()).await,
        )?;
        Some(rule.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupRulesDataSource {
    meta: MetaHandle,
}

impl SecurityGroupRulesDataSource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl DataSource for SecurityGroupRulesDataSource {
    type State<'a> = SecurityGroupRulesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupRulesState::schema())
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
        let security_group_id = config.security_group_id.as_str();
        let rules = checked(
            diags,
            "Failed to read security group rules",
            fetch_rules(meta.client.as_ref(), security_group_id).await,
        )?;
        let (inbound, outbound) = split_directions(rules);

        Some(SecurityGroupRulesState {
            id: string_value(security_group_id),
            inbound_rules: rule_list(inbound),
            outbound_rules: rule_list(outbound),
            ..config
        })
    }
}
