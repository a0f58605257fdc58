use async_trait::async_trait;
use tracing::{debug, info};

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::{self, CoreApi, SecurityGroupArguments};
use crate::meta::MetaHandle;
use crate::utils::{
    bool_or, checked, found, report_api_error, set_strings, WithSchema, WithValidate,
};

use super::rules::{apply_diff, diff_rules, fetch_rules, order_like, split_directions, Rule};
use super::state::{rule_list, SecurityGroupState};

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupResource {
    meta: MetaHandle,
}

impl SecurityGroupResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

/// Rules of the group as (inbound, outbound), each ordered like the known state
async fn read_rules(
    client: &dyn CoreApi,
    id: &str,
    known: &SecurityGroupState<'_>,
) -> api::Result<(Vec<Rule>, Vec<Rule>)> {
    let (inbound, outbound) = split_directions(fetch_rules(client, id).await?);
    Ok((
        order_like(&known.inbound_rules(), inbound),
        order_like(&known.outbound_rules(), outbound),
    ))
}

/// Bring the inline rules of the group from `prior` to `planned`
async fn reconcile_rules(
    client: &dyn CoreApi,
    id: &str,
    prior: &SecurityGroupState<'_>,
    planned: &SecurityGroupState<'_>,
) -> api::Result<()> {
    for (old, new) in [
        (prior.inbound_rules(), planned.inbound_rules()),
        (prior.outbound_rules(), planned.outbound_rules()),
    ] {
        let diff = diff_rules(&old, &new);
        if diff.is_empty() {
            continue;
        }
        debug!(
            security_group_id = id,
            create = diff.create.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            "reconciling security group rules"
        );
        apply_diff(client, id, &diff).await?;
    }
    Ok(())
}

impl SecurityGroupResource {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        client: &dyn CoreApi,
        id: &str,
        known: &SecurityGroupState<'a>,
    ) -> Option<SecurityGroupState<'a>> {
        let group = checked(
            diags,
            "Failed to read security group",
            client.get_security_group(id).await,
        )?;
        let rules = if known.external_rules() {
            None
        } else {
            Some(checked(
                diags,
                "Failed to read security group rules",
                read_rules(client, id, known).await,
            )?)
        };
        Some(SecurityGroupState::flatten(group, rules, known))
    }
}

#[async_trait]
impl Resource for SecurityGroupResource {
    type State<'a> = SecurityGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecurityGroupState::schema())
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
        let id = state.id.as_str();
        let group = found(
            diags,
            "Failed to read security group",
            meta.client.get_security_group(id).await,
        )?;
        let rules = if state.external_rules() {
            None
        } else {
            Some(checked(
                diags,
                "Failed to read security group rules",
                read_rules(meta.client.as_ref(), id, &state).await,
            )?)
        };
        Some((
            SecurityGroupState::flatten(group, rules, &state),
            private_state,
        ))
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
        state.mark_new_rules_unknown();
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
        state.apply_defaults();
        state.mark_new_rules_unknown();
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
        let client = meta.client.as_ref();

        let args = SecurityGroupArguments {
            name: planned_state.name.as_deref_option().map(str::to_owned),
            allow_all_inbound: Some(bool_or(&planned_state.allow_all_inbound, false)),
            allow_all_outbound: Some(bool_or(&planned_state.allow_all_outbound, false)),
            associations: Some(set_strings(&planned_state.associations)),
        };
        let group = checked(
            diags,
            "Failed to create security group",
            client.create_security_group(&meta.organization, &args).await,
        )?;
        info!(id = group.id, name = group.name, "security group created");

        if !planned_state.external_rules() {
            checked(
                diags,
                "Failed to create security group rules",
                reconcile_rules(client, &group.id, &Default::default(), &planned_state).await,
            )?;
        }

        let state = self
            .refresh(diags, client, &group.id, &planned_state)
            .await?;
        Some((state, private_state))
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
        let client = meta.client.as_ref();
        let id = prior_state.id.as_str();

        let mut args = SecurityGroupArguments::default();
        if prior_state.name != planned_state.name {
            args.name = planned_state.name.as_deref_option().map(str::to_owned);
        }
        if prior_state.allow_all_inbound != planned_state.allow_all_inbound {
            args.allow_all_inbound = Some(bool_or(&planned_state.allow_all_inbound, false));
        }
        if prior_state.allow_all_outbound != planned_state.allow_all_outbound {
            args.allow_all_outbound = Some(bool_or(&planned_state.allow_all_outbound, false));
        }
        if prior_state.associations != planned_state.associations {
            args.associations = Some(set_strings(&planned_state.associations));
        }

        if args != SecurityGroupArguments::default() {
            checked(
                diags,
                "Failed to update security group",
                client.update_security_group(id, &args).await,
            )?;
        }

        if !planned_state.external_rules() {
            let prior = if prior_state.external_rules() {
                // Rules were not tracked: reconcile from what exists
                let (inbound, outbound) = checked(
                    diags,
                    "Failed to read security group rules",
                    read_rules(client, id, &planned_state).await,
                )?;
                SecurityGroupState {
                    inbound_rule: rule_list(inbound),
                    outbound_rule: rule_list(outbound),
                    ..Default::default()
                }
            } else {
                prior_state.clone()
            };
            checked(
                diags,
                "Failed to update security group rules",
                reconcile_rules(client, id, &prior, &planned_state).await,
            )?;
        }

        let state = self.refresh(diags, client, id, &planned_state).await?;
        Some((state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let meta = self.meta.get(diags)?;
        match meta.client.delete_security_group(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report_api_error(diags, "Failed to delete security group", &err);
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
        let known = SecurityGroupState {
            external_rules: Value::Value(false),
            ..Default::default()
        };
        let state = self
            .refresh(diags, meta.client.as_ref(), &id, &known)
            .await?;
        Some((state, Default::default()))
    }
}
