use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{ValueBool, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider};

use crate::api::{ClientOptions, KatapultClient};
use crate::config::{
    validate_log_level, Config, ConfigInput, ENV_API_KEY, ENV_API_URL, ENV_DATA_CENTER,
    ENV_LOG_LEVEL, ENV_ORGANIZATION, ENV_SKIP_TRASH_OBJECT_PURGE,
};
use crate::data_center::DataCenterDataSource;
use crate::disk_template::{DiskTemplateDataSource, DiskTemplatesDataSource};
use crate::ip::{IpDataSource, IpResource};
use crate::load_balancer::{
    LoadBalancerDataSource, LoadBalancerResource, LoadBalancersDataSource,
};
use crate::load_balancer_rule::{
    LoadBalancerRuleDataSource, LoadBalancerRuleResource, LoadBalancerRulesDataSource,
};
use crate::logging;
use crate::meta::{Meta, MetaHandle};
use crate::network::{NetworkDataSource, NetworksDataSource};
use crate::network_speed_profile::{NetworkSpeedProfileDataSource, NetworkSpeedProfilesDataSource};
use crate::security_group::{SecurityGroupDataSource, SecurityGroupResource, SecurityGroupsDataSource};
use crate::security_group_rule::{
    SecurityGroupRuleDataSource, SecurityGroupRuleResource, SecurityGroupRulesDataSource,
};
use crate::shutdown;
use crate::utils::non_empty;
use crate::virtual_machine::{VirtualMachineDataSource, VirtualMachineResource};
use crate::virtual_machine_group::{
    VirtualMachineGroupDataSource, VirtualMachineGroupResource, VirtualMachineGroupsDataSource,
};
use crate::virtual_machine_package::{
    VirtualMachinePackageDataSource, VirtualMachinePackagesDataSource,
};

/// Provider block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub api_key: ValueString<'a>,
    pub api_url: ValueString<'a>,
    pub organization: ValueString<'a>,
    pub data_center: ValueString<'a>,
    pub skip_trash_object_purge: ValueBool,
    pub log_level: ValueString<'a>,
}

impl ProviderConfig<'_> {
    fn input(&self) -> ConfigInput {
        ConfigInput {
            api_key: non_empty(&self.api_key),
            api_url: non_empty(&self.api_url),
            organization: non_empty(&self.organization),
            data_center: non_empty(&self.data_center),
            skip_trash_object_purge: self.skip_trash_object_purge.as_ref_option().copied(),
            log_level: non_empty(&self.log_level),
        }
    }
}

fn optional_string(description: String, sensitive: bool) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        ..Default::default()
    }
}

lazy_static! {
    static ref ATTRIBUTES: HashMap<String, Attribute> = map! {
        "api_key" => optional_string(
            format!("API key used to authenticate against the Katapult API (env: {ENV_API_KEY})"),
            true,
        ),
        "api_url" => optional_string(
            format!("Base URL of the Katapult Core API (env: {ENV_API_URL})"),
            false,
        ),
        "organization" => optional_string(
            format!("Sub-domain or ID of the organization owning the resources (env: {ENV_ORGANIZATION})"),
            false,
        ),
        "data_center" => optional_string(
            format!("Permalink or ID of the data center resources are created in (env: {ENV_DATA_CENTER})"),
            false,
        ),
        "skip_trash_object_purge" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain(format!(
                "Leave deleted objects in the trash instead of purging them (env: {ENV_SKIP_TRASH_OBJECT_PURGE})"
            )),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "log_level" => optional_string(
            format!("Log level of the provider: trace, debug, info, warn, error or off (env: {ENV_LOG_LEVEL})"),
            false,
        ),
    };
}

#[derive(Debug, Default, Clone)]
pub struct KatapultProvider {
    meta: MetaHandle,
}

#[async_trait]
impl Provider for KatapultProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: ATTRIBUTES.clone(),
                description: Description::plain("Katapult cloud provider"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Some(level) = non_empty(&config.log_level) {
            if let Err(err) = validate_log_level(&level) {
                diags.error(
                    "Invalid log level",
                    err.to_string(),
                    AttributePath::new("log_level"),
                );
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let config = match Config::from_env(config.input()) {
            Ok(config) => config,
            Err(errors) => {
                for err in errors {
                    diags.error(
                        "Invalid provider configuration",
                        err.to_string(),
                        AttributePath::new(err.attribute()),
                    );
                }
                return None;
            }
        };
        logging::init(&config.log_level);

        let cancel = CancellationToken::new();
        let defaults = ClientOptions::default();
        let options = ClientOptions {
            api_key: config.api_key.clone(),
            base_url: config.api_url.clone(),
            user_agent: format!("{} terraform/{terraform_version}", defaults.user_agent),
            cancel: cancel.clone(),
            ..defaults
        };
        let client = match KatapultClient::new(options) {
            Ok(client) => client,
            Err(err) => {
                diags.root_error("Failed to create the Katapult API client", err.to_string());
                return None;
            }
        };

        let meta = Meta::new(Arc::new(client), &config).with_cancel(cancel.clone());
        if !self.meta.set(meta) {
            diags.root_warning_short("The Katapult provider was configured twice, the first configuration is kept");
            return Some(());
        }
        shutdown::cancel_on_signal(cancel);
        info!(
            organization = config.organization,
            data_center = config.data_center,
            api_url = config.api_url,
            "provider configured"
        );
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let meta = &self.meta;
        Some(map! {
            "katapult_virtual_machine" => VirtualMachineResource::new(meta.clone()),
            "katapult_virtual_machine_group" => VirtualMachineGroupResource::new(meta.clone()),
            "katapult_ip" => IpResource::new(meta.clone()),
            "katapult_load_balancer" => LoadBalancerResource::new(meta.clone()),
            "katapult_load_balancer_rule" => LoadBalancerRuleResource::new(meta.clone()),
            "katapult_security_group" => SecurityGroupResource::new(meta.clone()),
            "katapult_security_group_rule" => SecurityGroupRuleResource::new(meta.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let meta = &self.meta;
        Some(map! {
            "katapult_data_center" => DataCenterDataSource::new(meta.clone()),
            "katapult_disk_template" => DiskTemplateDataSource::new(meta.clone()),
            "katapult_disk_templates" => DiskTemplatesDataSource::new(meta.clone()),
            "katapult_network" => NetworkDataSource::new(meta.clone()),
            "katapult_networks" => NetworksDataSource::new(meta.clone()),
            "katapult_network_speed_profile" => NetworkSpeedProfileDataSource::new(meta.clone()),
            "katapult_network_speed_profiles" => NetworkSpeedProfilesDataSource::new(meta.clone()),
            "katapult_virtual_machine_package" => VirtualMachinePackageDataSource::new(meta.clone()),
            "katapult_virtual_machine_packages" => VirtualMachinePackagesDataSource::new(meta.clone()),
            "katapult_virtual_machine" => VirtualMachineDataSource::new(meta.clone()),
            "katapult_virtual_machine_group" => VirtualMachineGroupDataSource::new(meta.clone()),
            "katapult_virtual_machine_groups" => VirtualMachineGroupsDataSource::new(meta.clone()),
            "katapult_ip" => IpDataSource::new(meta.clone()),
            "katapult_load_balancer" => LoadBalancerDataSource::new(meta.clone()),
            "katapult_load_balancers" => LoadBalancersDataSource::new(meta.clone()),
            "katapult_load_balancer_rule" => LoadBalancerRuleDataSource::new(meta.clone()),
            "katapult_load_balancer_rules" => LoadBalancerRulesDataSource::new(meta.clone()),
            "katapult_security_group" => SecurityGroupDataSource::new(meta.clone()),
            "katapult_security_groups" => SecurityGroupsDataSource::new(meta.clone()),
            "katapult_security_group_rule" => SecurityGroupRuleDataSource::new(meta.clone()),
            "katapult_security_group_rules" => SecurityGroupRulesDataSource::new(meta.clone()),
        })
    }
}
