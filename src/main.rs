use anyhow::Result;
use provider::KatapultProvider;
use tf_provider::serve;

mod api;
mod config;
mod data_center;
mod disk_template;
mod ip;
mod load_balancer;
mod load_balancer_rule;
mod logging;
mod meta;
mod network;
mod network_speed_profile;
mod operations;
mod provider;
mod security_group;
mod security_group_rule;
mod shutdown;
mod utils;
mod virtual_machine;
mod virtual_machine_group;
mod virtual_machine_package;
mod waiter;

#[tokio::main]
async fn main() -> Result<()> {
    serve("katapult", KatapultProvider::default()).await
}
