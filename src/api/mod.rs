use async_trait::async_trait;

mod client;
mod error;
#[cfg(test)]
pub mod fake;
mod pagination;
mod types;

pub use client::{ClientOptions, KatapultClient, DEFAULT_API_URL};
pub use error::{optional, ApiError, Result};
pub use pagination::{fetch_all, find_first};
pub use types::*;

/// Operations of the Katapult Core API consumed by the provider
///
/// Resources and data sources only talk to the API through this trait.
#[async_trait]
pub trait CoreApi: Send + Sync + 'static {
    // Tasks and trash
    async fn get_task(&self, id: &str) -> Result<Task>;
    async fn get_trash_object(&self, object_id: &str) -> Result<TrashObject>;
    async fn purge_trash_object(&self, object_id: &str) -> Result<Task>;

    // Data centers and networks
    async fn get_data_center(&self, data_center: &Lookup) -> Result<DataCenter>;
    async fn get_default_network(&self, data_center: &Lookup) -> Result<Network>;
    async fn get_network(&self, network: &Lookup) -> Result<Network>;
    /// Networks the organization can use, in every data center
    async fn list_networks(&self, organization: &Lookup) -> Result<Vec<Network>>;

    // Disk templates
    async fn list_disk_templates(
        &self,
        organization: &Lookup,
        include_universal: bool,
        page: u32,
    ) -> Result<Page<DiskTemplate>>;

    // Packages and speed profiles
    async fn list_virtual_machine_packages(&self, page: u32) -> Result<Page<VirtualMachinePackage>>;
    async fn get_virtual_machine_package(&self, package: &Lookup) -> Result<VirtualMachinePackage>;
    async fn list_network_speed_profiles(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<NetworkSpeedProfile>>;

    // IP addresses
    async fn create_ip_address(
        &self,
        organization: &Lookup,
        args: &IpAddressArguments,
    ) -> Result<IpAddress>;
    async fn get_ip_address(&self, id: &str) -> Result<IpAddress>;
    async fn find_ip_address(&self, address: &str) -> Result<IpAddress>;
    async fn update_ip_address(&self, id: &str, args: &IpAddressUpdate) -> Result<IpAddress>;
    async fn delete_ip_address(&self, id: &str) -> Result<()>;
    async fn unallocate_ip_address(&self, id: &str) -> Result<()>;

    // Virtual machine groups
    async fn create_virtual_machine_group(
        &self,
        organization: &Lookup,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup>;
    async fn get_virtual_machine_group(&self, id: &str) -> Result<VirtualMachineGroup>;
    async fn update_virtual_machine_group(
        &self,
        id: &str,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup>;
    async fn delete_virtual_machine_group(&self, id: &str) -> Result<()>;
    async fn list_virtual_machine_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<VirtualMachineGroup>>;

    // Load balancers
    async fn create_load_balancer(
        &self,
        organization: &Lookup,
        data_center: &Lookup,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer>;
    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer>;
    async fn update_load_balancer(
        &self,
        id: &str,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer>;
    async fn delete_load_balancer(&self, id: &str) -> Result<()>;
    async fn list_load_balancers(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<LoadBalancer>>;

    async fn create_load_balancer_rule(
        &self,
        load_balancer_id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule>;
    async fn get_load_balancer_rule(&self, id: &str) -> Result<LoadBalancerRule>;
    async fn update_load_balancer_rule(
        &self,
        id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule>;
    async fn delete_load_balancer_rule(&self, id: &str) -> Result<()>;
    async fn list_load_balancer_rules(
        &self,
        load_balancer_id: &str,
        page: u32,
    ) -> Result<Page<LoadBalancerRule>>;

    // Security groups
    async fn create_security_group(
        &self,
        organization: &Lookup,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup>;
    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup>;
    async fn update_security_group(
        &self,
        id: &str,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup>;
    async fn delete_security_group(&self, id: &str) -> Result<()>;
    async fn list_security_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<SecurityGroup>>;

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
        page: u32,
    ) -> Result<Page<SecurityGroupRule>>;
    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule>;
    async fn get_security_group_rule(&self, id: &str) -> Result<SecurityGroupRule>;
    async fn update_security_group_rule(
        &self,
        id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule>;
    async fn delete_security_group_rule(&self, id: &str) -> Result<()>;

    // Virtual machines
    async fn build_virtual_machine(
        &self,
        organization: &Lookup,
        args: &VirtualMachineBuildArguments,
    ) -> Result<VirtualMachineBuild>;
    async fn get_virtual_machine_build(&self, id: &str) -> Result<VirtualMachineBuild>;
    async fn get_virtual_machine(&self, id: &str) -> Result<VirtualMachine>;
    async fn find_virtual_machine(&self, fqdn: &str) -> Result<VirtualMachine>;
    async fn update_virtual_machine(
        &self,
        id: &str,
        args: &VirtualMachineUpdate,
    ) -> Result<VirtualMachine>;
    async fn stop_virtual_machine(&self, id: &str) -> Result<Task>;
    async fn delete_virtual_machine(&self, id: &str) -> Result<TrashObject>;

    async fn list_virtual_machine_network_interfaces(
        &self,
        virtual_machine_id: &str,
        page: u32,
    ) -> Result<Page<VirtualMachineNetworkInterface>>;
    async fn allocate_ip_address(&self, interface_id: &str, ip_address_id: &str) -> Result<()>;
    async fn attach_virtual_network(
        &self,
        virtual_machine_id: &str,
        virtual_network_id: &str,
    ) -> Result<Task>;
    async fn detach_virtual_network(&self, interface_id: &str) -> Result<Task>;
    async fn update_network_speed_profile(
        &self,
        interface_id: &str,
        speed_profile: &Lookup,
    ) -> Result<Task>;
}
