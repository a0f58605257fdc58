//! In-memory implementation of [`CoreApi`] for tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::error::GenericApiError;
use super::*;

#[derive(Debug, Default)]
pub struct FakeState {
    pub tasks: BTreeMap<String, Task>,
    /// Trash objects, by object id
    pub trash: BTreeMap<String, TrashObject>,
    pub data_centers: Vec<DataCenter>,
    pub default_network: Network,
    /// Networks besides the default one
    pub networks: Vec<Network>,
    pub disk_templates: Vec<DiskTemplate>,
    pub packages: Vec<VirtualMachinePackage>,
    pub speed_profiles: Vec<NetworkSpeedProfile>,
    pub ip_addresses: BTreeMap<String, IpAddress>,
    pub groups: BTreeMap<String, VirtualMachineGroup>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    /// Rules with the id of their load balancer
    pub load_balancer_rules: BTreeMap<String, (String, LoadBalancerRule)>,
    pub security_groups: BTreeMap<String, SecurityGroup>,
    /// Rules with the id of their security group
    pub security_group_rules: BTreeMap<String, (String, SecurityGroupRule)>,
    pub virtual_machines: BTreeMap<String, VirtualMachine>,
    pub builds: BTreeMap<String, VirtualMachineBuild>,
    /// Arguments of every build request
    pub build_arguments: Vec<VirtualMachineBuildArguments>,
    pub interfaces: BTreeMap<String, Vec<VirtualMachineNetworkInterface>>,
    /// Items per page of list endpoints, everything on one page when 0
    pub page_size: usize,
    pub calls: Vec<String>,
    next_id: u32,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn completed_task(&mut self) -> Task {
        let task = Task {
            id: self.next_id("task"),
            name: String::from("fake"),
            status: String::from("completed"),
        };
        self.tasks.insert(task.id.clone(), task.clone());
        task
    }

    fn page<T: Clone>(&self, items: Vec<T>, page: u32) -> Page<T> {
        if self.page_size == 0 {
            return Page {
                pagination: Pagination {
                    current_page: 1,
                    total_pages: 1,
                    total: items.len() as u64,
                    per_page: items.len() as u32,
                },
                items,
            };
        }
        let total = items.len();
        let total_pages = total.div_ceil(self.page_size).max(1) as u32;
        let start = (page.saturating_sub(1) as usize) * self.page_size;
        Page {
            items: items.into_iter().skip(start).take(self.page_size).collect(),
            pagination: Pagination {
                current_page: page,
                total_pages,
                total: total as u64,
                per_page: self.page_size as u32,
            },
        }
    }

    fn available_networks(&self) -> Vec<Network> {
        std::iter::once(self.default_network.clone())
            .chain(self.networks.iter().cloned())
            .filter(|network| !network.id.is_empty())
            .collect()
    }

    fn remove_ip_from_machines(&mut self, ip_id: &str) {
        for vm in self.virtual_machines.values_mut() {
            vm.ip_addresses.retain(|ip| ip.id != ip_id);
        }
        for ifaces in self.interfaces.values_mut() {
            for iface in ifaces {
                iface.ip_addresses.retain(|ip| ip.id != ip_id);
            }
        }
    }
}

pub fn not_found(kind: &str) -> ApiError {
    ApiError::NotFound(GenericApiError {
        code: format!("{kind}_not_found"),
        description: format!("No {kind} was found matching any of the criteria provided"),
        detail: String::new(),
    })
}

fn validation_error(detail: &str) -> ApiError {
    ApiError::Api(GenericApiError {
        code: String::from("validation_error"),
        description: String::from("A validation error occurred with the object"),
        detail: detail.to_owned(),
    })
}

fn find<T: Clone>(items: &[T], lookup: &Lookup, id: impl Fn(&T) -> &str, permalink: impl Fn(&T) -> &str) -> Option<T> {
    items
        .iter()
        .find(|item| match lookup {
            Lookup::Id(value) => id(item) == value,
            Lookup::Permalink(value) => permalink(item) == value,
        })
        .cloned()
}

#[derive(Debug, Default)]
pub struct FakeCore {
    state: Mutex<FakeState>,
}

impl FakeCore {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a call and give access to the state
    fn call(&self, call: String) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls not starting with `get_` or `list_`
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("get_") && !call.starts_with("list_"))
            .collect()
    }

    pub fn add_ip(&self, id: &str, address: &str, network_id: &str) -> IpAddress {
        let ip = IpAddress {
            id: id.to_owned(),
            address: address.to_owned(),
            address_with_mask: format!("{address}/32"),
            network: Some(Network {
                id: network_id.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.state().ip_addresses.insert(ip.id.clone(), ip.clone());
        ip
    }

    /// Add a machine with one network interface per network
    pub fn add_virtual_machine(&self, vm: VirtualMachine, networks: &[&str]) {
        let mut state = self.state();
        let ifaces = networks
            .iter()
            .enumerate()
            .map(|(i, network)| VirtualMachineNetworkInterface {
                id: format!("vmnet_{}_{i}", vm.id),
                network: Some(Network {
                    id: (*network).to_owned(),
                    ..Default::default()
                }),
                mac_address: format!("02:00:00:00:00:0{i}"),
                ip_addresses: vm
                    .ip_addresses
                    .iter()
                    .filter(|ip| ip.network.as_ref().map(|n| n.id.as_str()) == Some(*network))
                    .cloned()
                    .collect(),
                ..Default::default()
            })
            .collect();
        state.interfaces.insert(vm.id.clone(), ifaces);
        state.virtual_machines.insert(vm.id.clone(), vm);
    }
}

#[async_trait]
impl CoreApi for FakeCore {
    async fn get_task(&self, id: &str) -> Result<Task> {
        let state = self.call(format!("get_task {id}"));
        state.tasks.get(id).cloned().ok_or_else(|| not_found("task"))
    }

    async fn get_trash_object(&self, object_id: &str) -> Result<TrashObject> {
        let state = self.call(format!("get_trash_object {object_id}"));
        state
            .trash
            .get(object_id)
            .cloned()
            .ok_or_else(|| not_found("trash_object"))
    }

    async fn purge_trash_object(&self, object_id: &str) -> Result<Task> {
        let mut state = self.call(format!("purge_trash_object {object_id}"));
        match state.trash.remove(object_id) {
            Some(_) => Ok(state.completed_task()),
            None => Err(not_found("trash_object")),
        }
    }

    async fn get_data_center(&self, data_center: &Lookup) -> Result<DataCenter> {
        let state = self.call(format!("get_data_center {data_center}"));
        find(&state.data_centers, data_center, |dc| dc.id.as_str(), |dc| dc.permalink.as_str())
            .ok_or_else(|| not_found("data_center"))
    }

    async fn get_default_network(&self, data_center: &Lookup) -> Result<Network> {
        let state = self.call(format!("get_default_network {data_center}"));
        Ok(state.default_network.clone())
    }

    async fn get_network(&self, network: &Lookup) -> Result<Network> {
        let state = self.call(format!("get_network {network}"));
        let networks = state.available_networks();
        find(&networks, network, |n| n.id.as_str(), |n| n.permalink.as_str())
            .ok_or_else(|| not_found("network"))
    }

    async fn list_networks(&self, organization: &Lookup) -> Result<Vec<Network>> {
        let state = self.call(format!("list_networks {organization}"));
        Ok(state.available_networks())
    }

    async fn list_disk_templates(
        &self,
        organization: &Lookup,
        include_universal: bool,
        page: u32,
    ) -> Result<Page<DiskTemplate>> {
        let state = self.call(format!("list_disk_templates {organization} {page}"));
        let templates = state
            .disk_templates
            .iter()
            .filter(|template| include_universal || !template.universal)
            .cloned()
            .collect();
        Ok(state.page(templates, page))
    }

    async fn list_virtual_machine_packages(&self, page: u32) -> Result<Page<VirtualMachinePackage>> {
        let state = self.call(format!("list_virtual_machine_packages {page}"));
        Ok(state.page(state.packages.clone(), page))
    }

    async fn get_virtual_machine_package(&self, package: &Lookup) -> Result<VirtualMachinePackage> {
        let state = self.call(format!("get_virtual_machine_package {package}"));
        find(&state.packages, package, |p| p.id.as_str(), |p| p.permalink.as_str())
            .ok_or_else(|| not_found("package"))
    }

    async fn list_network_speed_profiles(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<NetworkSpeedProfile>> {
        let state = self.call(format!("list_network_speed_profiles {organization} {page}"));
        Ok(state.page(state.speed_profiles.clone(), page))
    }

    async fn create_ip_address(
        &self,
        organization: &Lookup,
        args: &IpAddressArguments,
    ) -> Result<IpAddress> {
        let mut state = self.call(format!("create_ip_address {organization}"));
        if args.vip == Some(true) && args.label.as_deref().unwrap_or_default().is_empty() {
            return Err(validation_error("label is required for VIPs"));
        }
        let id = state.next_id("ip");
        let address = match args.version {
            IpVersion::V4 => format!("185.0.0.{}", state.next_id),
            IpVersion::V6 => format!("2a03:2800::{}", state.next_id),
        };
        let ip = IpAddress {
            id: id.clone(),
            address_with_mask: format!("{address}/32"),
            reverse_dns: format!("{id}.example.net"),
            address,
            vip: args.vip.unwrap_or_default(),
            label: args.label.clone().unwrap_or_default(),
            network: Some(Network {
                id: args.network_id.clone(),
                ..Default::default()
            }),
            allocation_type: None,
            allocation_id: None,
        };
        state.ip_addresses.insert(id, ip.clone());
        Ok(ip)
    }

    async fn get_ip_address(&self, id: &str) -> Result<IpAddress> {
        let state = self.call(format!("get_ip_address {id}"));
        state
            .ip_addresses
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("ip_address"))
    }

    async fn find_ip_address(&self, address: &str) -> Result<IpAddress> {
        let state = self.call(format!("get_ip_address_by_address {address}"));
        state
            .ip_addresses
            .values()
            .find(|ip| ip.address == address)
            .cloned()
            .ok_or_else(|| not_found("ip_address"))
    }

    async fn update_ip_address(&self, id: &str, args: &IpAddressUpdate) -> Result<IpAddress> {
        let mut state = self.call(format!("update_ip_address {id}"));
        let ip = state
            .ip_addresses
            .get_mut(id)
            .ok_or_else(|| not_found("ip_address"))?;
        if let Some(vip) = args.vip {
            ip.vip = vip;
        }
        if let Some(label) = &args.label {
            ip.label.clone_from(label);
        }
        Ok(ip.clone())
    }

    async fn delete_ip_address(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_ip_address {id}"));
        state
            .ip_addresses
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("ip_address"))
    }

    async fn unallocate_ip_address(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("unallocate_ip_address {id}"));
        let ip = state
            .ip_addresses
            .get_mut(id)
            .ok_or_else(|| not_found("ip_address"))?;
        ip.allocation_id = None;
        ip.allocation_type = None;
        state.remove_ip_from_machines(id);
        Ok(())
    }

    async fn create_virtual_machine_group(
        &self,
        organization: &Lookup,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup> {
        let mut state = self.call(format!("create_virtual_machine_group {organization}"));
        let group = VirtualMachineGroup {
            id: state.next_id("vmgrp"),
            name: args.name.clone().unwrap_or_default(),
            segregate: args.segregate.unwrap_or(true),
        };
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn get_virtual_machine_group(&self, id: &str) -> Result<VirtualMachineGroup> {
        let state = self.call(format!("get_virtual_machine_group {id}"));
        state
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("virtual_machine_group"))
    }

    async fn update_virtual_machine_group(
        &self,
        id: &str,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup> {
        let mut state = self.call(format!("update_virtual_machine_group {id}"));
        let group = state
            .groups
            .get_mut(id)
            .ok_or_else(|| not_found("virtual_machine_group"))?;
        if let Some(name) = &args.name {
            group.name.clone_from(name);
        }
        if let Some(segregate) = args.segregate {
            group.segregate = segregate;
        }
        Ok(group.clone())
    }

    async fn delete_virtual_machine_group(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_virtual_machine_group {id}"));
        state
            .groups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("virtual_machine_group"))
    }

    async fn list_virtual_machine_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<VirtualMachineGroup>> {
        let state = self.call(format!("list_virtual_machine_groups {organization} {page}"));
        Ok(state.page(state.groups.values().cloned().collect(), page))
    }

    async fn create_load_balancer(
        &self,
        organization: &Lookup,
        data_center: &Lookup,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer> {
        let mut state = self.call(format!("create_load_balancer {organization} {data_center}"));
        let id = state.next_id("lb");
        let lb = LoadBalancer {
            ip_address: Some(IpAddress {
                id: format!("ip_{id}"),
                address: String::from("185.1.1.1"),
                ..Default::default()
            }),
            id,
            name: args.name.clone().unwrap_or_default(),
            resource_type: args
                .resource_type
                .clone()
                .unwrap_or_else(|| String::from("virtual_machines")),
            resource_ids: args.resource_ids.clone().unwrap_or_default(),
            https_redirect: false,
        };
        state.load_balancers.insert(lb.id.clone(), lb.clone());
        Ok(lb)
    }

    async fn list_load_balancers(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<LoadBalancer>> {
        let state = self.call(format!("list_load_balancers {organization} {page}"));
        let lbs = state.load_balancers.values().cloned().collect();
        Ok(state.page(lbs, page))
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer> {
        let state = self.call(format!("get_load_balancer {id}"));
        state
            .load_balancers
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("load_balancer"))
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer> {
        let mut state = self.call(format!("update_load_balancer {id}"));
        let lb = state
            .load_balancers
            .get_mut(id)
            .ok_or_else(|| not_found("load_balancer"))?;
        if let Some(name) = &args.name {
            lb.name.clone_from(name);
        }
        if let Some(resource_type) = &args.resource_type {
            lb.resource_type.clone_from(resource_type);
        }
        if let Some(resource_ids) = &args.resource_ids {
            lb.resource_ids.clone_from(resource_ids);
        }
        Ok(lb.clone())
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_load_balancer {id}"));
        state
            .load_balancers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("load_balancer"))
    }

    async fn create_load_balancer_rule(
        &self,
        load_balancer_id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule> {
        let mut state = self.call(format!("create_load_balancer_rule {load_balancer_id}"));
        if !state.load_balancers.contains_key(load_balancer_id) {
            return Err(not_found("load_balancer"));
        }
        let mut rule = LoadBalancerRule {
            id: state.next_id("lbrule"),
            ..Default::default()
        };
        apply_rule_arguments(&mut rule, args);
        state.load_balancer_rules.insert(
            rule.id.clone(),
            (load_balancer_id.to_owned(), rule.clone()),
        );
        Ok(rule)
    }

    async fn get_load_balancer_rule(&self, id: &str) -> Result<LoadBalancerRule> {
        let state = self.call(format!("get_load_balancer_rule {id}"));
        state
            .load_balancer_rules
            .get(id)
            .map(|(_, rule)| rule.clone())
            .ok_or_else(|| not_found("load_balancer_rule"))
    }

    async fn update_load_balancer_rule(
        &self,
        id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule> {
        let mut state = self.call(format!("update_load_balancer_rule {id}"));
        let (_, rule) = state
            .load_balancer_rules
            .get_mut(id)
            .ok_or_else(|| not_found("load_balancer_rule"))?;
        apply_rule_arguments(rule, args);
        Ok(rule.clone())
    }

    async fn delete_load_balancer_rule(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_load_balancer_rule {id}"));
        state
            .load_balancer_rules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("load_balancer_rule"))
    }

    async fn list_load_balancer_rules(
        &self,
        load_balancer_id: &str,
        page: u32,
    ) -> Result<Page<LoadBalancerRule>> {
        let state = self.call(format!("list_load_balancer_rules {load_balancer_id} {page}"));
        if !state.load_balancers.contains_key(load_balancer_id) {
            return Err(not_found("load_balancer"));
        }
        // Listed rules only carry their id
        let rules = state
            .load_balancer_rules
            .values()
            .filter(|(lb_id, _)| lb_id == load_balancer_id)
            .map(|(_, rule)| LoadBalancerRule {
                id: rule.id.clone(),
                ..Default::default()
            })
            .collect();
        Ok(state.page(rules, page))
    }

    async fn create_security_group(
        &self,
        organization: &Lookup,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup> {
        let mut state = self.call(format!("create_security_group {organization}"));
        let group = SecurityGroup {
            id: state.next_id("sg"),
            name: args.name.clone().unwrap_or_default(),
            allow_all_inbound: args.allow_all_inbound.unwrap_or_default(),
            allow_all_outbound: args.allow_all_outbound.unwrap_or_default(),
            associations: args.associations.clone().unwrap_or_default(),
        };
        state
            .security_groups
            .insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup> {
        let state = self.call(format!("get_security_group {id}"));
        state
            .security_groups
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("security_group"))
    }

    async fn update_security_group(
        &self,
        id: &str,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup> {
        let mut state = self.call(format!("update_security_group {id}"));
        let group = state
            .security_groups
            .get_mut(id)
            .ok_or_else(|| not_found("security_group"))?;
        if let Some(name) = &args.name {
            group.name.clone_from(name);
        }
        if let Some(allow) = args.allow_all_inbound {
            group.allow_all_inbound = allow;
        }
        if let Some(allow) = args.allow_all_outbound {
            group.allow_all_outbound = allow;
        }
        if let Some(associations) = &args.associations {
            group.associations.clone_from(associations);
        }
        Ok(group.clone())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_security_group {id}"));
        state.security_group_rules.retain(|_, (group, _)| group != id);
        state
            .security_groups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("security_group"))
    }

    async fn list_security_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<SecurityGroup>> {
        let state = self.call(format!("list_security_groups {organization} {page}"));
        Ok(state.page(state.security_groups.values().cloned().collect(), page))
    }

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
        page: u32,
    ) -> Result<Page<SecurityGroupRule>> {
        let state = self.call(format!("list_security_group_rules {security_group_id} {page}"));
        if !state.security_groups.contains_key(security_group_id) {
            return Err(not_found("security_group"));
        }
        let rules = state
            .security_group_rules
            .values()
            .filter(|(group, _)| group == security_group_id)
            .map(|(_, rule)| rule.clone())
            .collect();
        Ok(state.page(rules, page))
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule> {
        let mut state = self.call(format!("create_security_group_rule {security_group_id}"));
        if !state.security_groups.contains_key(security_group_id) {
            return Err(not_found("security_group"));
        }
        let rule = SecurityGroupRule {
            id: state.next_id("sgr"),
            security_group: Some(ObjectRef {
                id: security_group_id.to_owned(),
            }),
            direction: args.direction.clone().unwrap_or_default(),
            protocol: args.protocol.clone().unwrap_or_default(),
            ports: args.ports.clone().filter(|ports| !ports.is_empty()),
            targets: args.targets.clone().unwrap_or_default(),
            notes: args.notes.clone().filter(|notes| !notes.is_empty()),
        };
        state.security_group_rules.insert(
            rule.id.clone(),
            (security_group_id.to_owned(), rule.clone()),
        );
        Ok(rule)
    }

    async fn get_security_group_rule(&self, id: &str) -> Result<SecurityGroupRule> {
        let state = self.call(format!("get_security_group_rule {id}"));
        state
            .security_group_rules
            .get(id)
            .map(|(_, rule)| rule.clone())
            .ok_or_else(|| not_found("security_group_rule"))
    }

    async fn update_security_group_rule(
        &self,
        id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule> {
        let mut state = self.call(format!("update_security_group_rule {id}"));
        let (_, rule) = state
            .security_group_rules
            .get_mut(id)
            .ok_or_else(|| not_found("security_group_rule"))?;
        if let Some(protocol) = &args.protocol {
            rule.protocol.clone_from(protocol);
        }
        if let Some(ports) = &args.ports {
            rule.ports = Some(ports.clone()).filter(|ports| !ports.is_empty());
        }
        if let Some(targets) = &args.targets {
            rule.targets.clone_from(targets);
        }
        if let Some(notes) = &args.notes {
            rule.notes = Some(notes.clone()).filter(|notes| !notes.is_empty());
        }
        Ok(rule.clone())
    }

    async fn delete_security_group_rule(&self, id: &str) -> Result<()> {
        let mut state = self.call(format!("delete_security_group_rule {id}"));
        state
            .security_group_rules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("security_group_rule"))
    }

    async fn build_virtual_machine(
        &self,
        organization: &Lookup,
        args: &VirtualMachineBuildArguments,
    ) -> Result<VirtualMachineBuild> {
        let mut state = self.call(format!("build_virtual_machine {organization}"));
        state.build_arguments.push(args.clone());
        let vm_id = state.next_id("vm");
        let build_id = state.next_id("vmbuild");

        let package = find(&state.packages, &args.package, |p| p.id.as_str(), |p| p.permalink.as_str())
            .ok_or_else(|| not_found("package"))?;

        let mut ifaces = Vec::new();
        let mut ips = Vec::new();
        for (i, iface) in args.network_interfaces.iter().enumerate() {
            let mut iface_ips = Vec::new();
            for ip_id in &iface.ip_address_ids {
                let ip = state
                    .ip_addresses
                    .get_mut(ip_id)
                    .ok_or_else(|| not_found("ip_address"))?;
                ip.allocation_type = Some(String::from("VirtualMachine"));
                ip.allocation_id = Some(vm_id.clone());
                iface_ips.push(ip.clone());
            }
            ips.extend(iface_ips.iter().cloned());
            ifaces.push(VirtualMachineNetworkInterface {
                id: format!("vmnet_{vm_id}_{i}"),
                network: iface.network_id.as_ref().map(|id| Network {
                    id: id.clone(),
                    ..Default::default()
                }),
                virtual_network: iface
                    .virtual_network_id
                    .as_ref()
                    .map(|id| ObjectRef { id: id.clone() }),
                mac_address: format!("02:00:00:00:00:0{i}"),
                ip_addresses: iface_ips,
                speed_profile: None,
            });
        }

        let vm = VirtualMachine {
            id: vm_id.clone(),
            name: args.name.clone().unwrap_or_else(|| args.hostname.clone()),
            hostname: args.hostname.clone(),
            description: args.description.clone().unwrap_or_default(),
            fqdn: format!("{}.acme.example.net", args.hostname),
            state: String::from("started"),
            package: Some(package),
            ip_addresses: ips,
            group: args.group_id.as_ref().map(|id| ObjectRef { id: id.clone() }),
            // Tags are applied asynchronously by the real API
            tag_names: Vec::new(),
        };
        state.virtual_machines.insert(vm_id.clone(), vm);
        state.interfaces.insert(vm_id.clone(), ifaces);

        let build = VirtualMachineBuild {
            id: build_id,
            state: String::from("complete"),
            virtual_machine: Some(ObjectRef { id: vm_id }),
        };
        state.builds.insert(build.id.clone(), build.clone());
        Ok(build)
    }

    async fn get_virtual_machine_build(&self, id: &str) -> Result<VirtualMachineBuild> {
        let state = self.call(format!("get_virtual_machine_build {id}"));
        state
            .builds
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("virtual_machine_build"))
    }

    async fn get_virtual_machine(&self, id: &str) -> Result<VirtualMachine> {
        let state = self.call(format!("get_virtual_machine {id}"));
        if let Some(trash) = state.trash.get(id) {
            return Err(ApiError::InTrash {
                error: GenericApiError {
                    code: String::from("object_in_trash"),
                    ..Default::default()
                },
                trash_object_id: Some(trash.id.clone()),
            });
        }
        state
            .virtual_machines
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("virtual_machine"))
    }

    async fn find_virtual_machine(&self, fqdn: &str) -> Result<VirtualMachine> {
        let state = self.call(format!("get_virtual_machine_by_fqdn {fqdn}"));
        state
            .virtual_machines
            .values()
            .find(|vm| vm.fqdn == fqdn)
            .cloned()
            .ok_or_else(|| not_found("virtual_machine"))
    }

    async fn update_virtual_machine(
        &self,
        id: &str,
        args: &VirtualMachineUpdate,
    ) -> Result<VirtualMachine> {
        let mut state = self.call(format!("update_virtual_machine {id}"));
        let vm = state
            .virtual_machines
            .get_mut(id)
            .ok_or_else(|| not_found("virtual_machine"))?;
        if let Some(name) = &args.name {
            vm.name.clone_from(name);
        }
        if let Some(hostname) = &args.hostname {
            vm.hostname.clone_from(hostname);
        }
        if let Some(description) = &args.description {
            vm.description.clone_from(description);
        }
        if let Some(group) = &args.group {
            vm.group.clone_from(group);
        }
        if let Some(tag_names) = &args.tag_names {
            vm.tag_names.clone_from(tag_names);
        }
        Ok(vm.clone())
    }

    async fn stop_virtual_machine(&self, id: &str) -> Result<Task> {
        let mut state = self.call(format!("stop_virtual_machine {id}"));
        let vm = state
            .virtual_machines
            .get_mut(id)
            .ok_or_else(|| not_found("virtual_machine"))?;
        vm.state = String::from("stopped");
        Ok(state.completed_task())
    }

    async fn delete_virtual_machine(&self, id: &str) -> Result<TrashObject> {
        let mut state = self.call(format!("delete_virtual_machine {id}"));
        let vm = state
            .virtual_machines
            .get(id)
            .ok_or_else(|| not_found("virtual_machine"))?;
        if vm.state != "stopped" {
            return Err(validation_error("virtual machine must be stopped"));
        }
        state.virtual_machines.remove(id);
        state.interfaces.remove(id);
        let trash = TrashObject {
            id: state.next_id("trsh"),
            keep_until: None,
            object_id: id.to_owned(),
            object_type: String::from("VirtualMachine"),
        };
        state.trash.insert(id.to_owned(), trash.clone());
        Ok(trash)
    }

    async fn list_virtual_machine_network_interfaces(
        &self,
        virtual_machine_id: &str,
        page: u32,
    ) -> Result<Page<VirtualMachineNetworkInterface>> {
        let state = self.call(format!(
            "list_virtual_machine_network_interfaces {virtual_machine_id} {page}"
        ));
        let ifaces = state
            .interfaces
            .get(virtual_machine_id)
            .cloned()
            .ok_or_else(|| not_found("virtual_machine"))?;
        Ok(state.page(ifaces, page))
    }

    async fn allocate_ip_address(&self, interface_id: &str, ip_address_id: &str) -> Result<()> {
        let mut state = self.call(format!("allocate_ip_address {interface_id} {ip_address_id}"));
        let ip = state
            .ip_addresses
            .get(ip_address_id)
            .cloned()
            .ok_or_else(|| not_found("ip_address"))?;
        let vm_id = state
            .interfaces
            .iter()
            .find(|(_, ifaces)| ifaces.iter().any(|iface| iface.id == interface_id))
            .map(|(vm_id, _)| vm_id.clone())
            .ok_or_else(|| not_found("virtual_machine_network_interface"))?;

        if let Some(iface) = state
            .interfaces
            .get_mut(&vm_id)
            .and_then(|ifaces| ifaces.iter_mut().find(|iface| iface.id == interface_id))
        {
            iface.ip_addresses.push(ip.clone());
        }
        if let Some(vm) = state.virtual_machines.get_mut(&vm_id) {
            vm.ip_addresses.push(ip);
        }
        if let Some(ip) = state.ip_addresses.get_mut(ip_address_id) {
            ip.allocation_type = Some(String::from("VirtualMachine"));
            ip.allocation_id = Some(vm_id);
        }
        Ok(())
    }

    async fn attach_virtual_network(
        &self,
        virtual_machine_id: &str,
        virtual_network_id: &str,
    ) -> Result<Task> {
        let mut state = self.call(format!(
            "attach_virtual_network {virtual_machine_id} {virtual_network_id}"
        ));
        let ifaces = state
            .interfaces
            .get_mut(virtual_machine_id)
            .ok_or_else(|| not_found("virtual_machine"))?;
        let index = ifaces.len();
        ifaces.push(VirtualMachineNetworkInterface {
            id: format!("vmnet_{virtual_machine_id}_{index}"),
            virtual_network: Some(ObjectRef {
                id: virtual_network_id.to_owned(),
            }),
            ..Default::default()
        });
        Ok(state.completed_task())
    }

    async fn detach_virtual_network(&self, interface_id: &str) -> Result<Task> {
        let mut state = self.call(format!("detach_virtual_network {interface_id}"));
        for ifaces in state.interfaces.values_mut() {
            ifaces.retain(|iface| iface.id != interface_id);
        }
        Ok(state.completed_task())
    }

    async fn update_network_speed_profile(
        &self,
        interface_id: &str,
        speed_profile: &Lookup,
    ) -> Result<Task> {
        let mut state = self.call(format!(
            "update_network_speed_profile {interface_id} {speed_profile}"
        ));
        let profile = find(&state.speed_profiles, speed_profile, |p| p.id.as_str(), |p| p.permalink.as_str())
            .ok_or_else(|| not_found("network_speed_profile"))?;
        let iface = state
            .interfaces
            .values_mut()
            .flat_map(|ifaces| ifaces.iter_mut())
            .find(|iface| iface.id == interface_id)
            .ok_or_else(|| not_found("virtual_machine_network_interface"))?;
        if iface.speed_profile.as_ref() == Some(&profile) {
            return Err(ApiError::Api(GenericApiError {
                code: String::from("speed_profile_already_assigned"),
                description: String::from("This speed profile is already assigned to this network interface"),
                detail: String::new(),
            }));
        }
        iface.speed_profile = Some(profile);
        Ok(state.completed_task())
    }
}

fn apply_rule_arguments(rule: &mut LoadBalancerRule, args: &LoadBalancerRuleArguments) {
    if let Some(algorithm) = &args.algorithm {
        rule.algorithm.clone_from(algorithm);
    }
    if let Some(port) = args.destination_port {
        rule.destination_port = port;
    }
    if let Some(port) = args.listen_port {
        rule.listen_port = port;
    }
    if let Some(protocol) = &args.protocol {
        rule.protocol.clone_from(protocol);
    }
    if let Some(proxy_protocol) = args.proxy_protocol {
        rule.proxy_protocol = proxy_protocol;
    }
    if let Some(certificates) = &args.certificates {
        rule.certificates.clone_from(certificates);
    }
    if let Some(backend_ssl) = args.backend_ssl {
        rule.backend_ssl = backend_ssl;
    }
    if let Some(passthrough_ssl) = args.passthrough_ssl {
        rule.passthrough_ssl = passthrough_ssl;
    }
    if let Some(enabled) = args.check_enabled {
        rule.check_enabled = enabled;
    }
    if let Some(fall) = args.check_fall {
        rule.check_fall = fall;
    }
    if let Some(interval) = args.check_interval {
        rule.check_interval = interval;
    }
    if let Some(path) = &args.check_path {
        rule.check_path.clone_from(path);
    }
    if let Some(protocol) = &args.check_protocol {
        rule.check_protocol.clone_from(protocol);
    }
    if let Some(rise) = args.check_rise {
        rule.check_rise = rise;
    }
    if let Some(timeout) = args.check_timeout {
        rule.check_timeout = timeout;
    }
}
