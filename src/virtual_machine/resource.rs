use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::api::{
    self, fetch_all, ApiError, AuthorizedKeys, CoreApi, Lookup, NetworkInterfaceArguments,
    ObjectRef, Task, VirtualMachineBuildArguments, VirtualMachineNetworkInterface,
    VirtualMachineUpdate,
};
use crate::meta::{Meta, MetaHandle};
use crate::operations::wait_for_task;
use crate::utils::{
    checked, found, non_empty, replace_if_changed, report_api_error, report_wait_error,
    strings_diff, WithSchema, WithValidate,
};
use crate::waiter::Waiter;

use super::delete::{self, Deletion};
use super::state::VirtualMachineState;

const CREATE_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const SPEED_PROFILE_ALREADY_ASSIGNED: &str = "speed_profile_already_assigned";

#[derive(Debug, Clone, Default)]
pub struct VirtualMachineResource {
    meta: MetaHandle,
}

impl VirtualMachineResource {
    pub fn new(meta: MetaHandle) -> Self {
        Self { meta }
    }
}

pub(super) async fn interfaces(
    client: &dyn CoreApi,
    virtual_machine_id: &str,
) -> api::Result<Vec<VirtualMachineNetworkInterface>> {
    fetch_all(|page| client.list_virtual_machine_network_interfaces(virtual_machine_id, page)).await
}

/// Current state of a machine along with its network interfaces
async fn refresh<'a>(
    diags: &mut Diagnostics,
    client: &dyn CoreApi,
    id: &str,
    prior: &VirtualMachineState<'a>,
) -> Option<VirtualMachineState<'a>> {
    let vm = checked(
        diags,
        "Failed to read virtual machine",
        client.get_virtual_machine(id).await,
    )?;
    let ifaces = checked(
        diags,
        "Failed to read virtual machine network interfaces",
        interfaces(client, id).await,
    )?;
    Some(VirtualMachineState::flatten(vm, ifaces, prior))
}

async fn wait_task(diags: &mut Diagnostics, meta: &Meta, task: Task, summary: &'static str) -> Option<()> {
    match wait_for_task(meta, &task.id, UPDATE_TIMEOUT).await {
        Ok(_) => Some(()),
        Err(err) => {
            report_wait_error(diags, summary, &err);
            None
        }
    }
}

/// Build arguments of a planned machine
///
/// IP addresses are grouped in one interface per network, virtual networks get
/// an interface each.
async fn build_arguments(
    diags: &mut Diagnostics,
    meta: &Meta,
    planned: &VirtualMachineState<'_>,
) -> Option<VirtualMachineBuildArguments> {
    let mut networks = BTreeMap::<String, Vec<String>>::new();
    for ip_address_id in planned.ip_address_ids() {
        let ip = checked(
            diags,
            "Failed to read IP address",
            meta.client.get_ip_address(&ip_address_id).await,
        )?;
        match ip.network.filter(|network| !network.id.is_empty()) {
            Some(network) => networks.entry(network.id).or_default().push(ip.id),
            None => {
                diags.error(
                    "Unknown IP address network",
                    format!("could not determine network of IP ID: {ip_address_id}"),
                    AttributePath::new("ip_address_ids"),
                );
                return None;
            }
        }
    }

    let speed_profile = non_empty(&planned.network_speed_profile)
        .map(|profile| Lookup::network_speed_profile(&profile));
    let network_interfaces = networks
        .into_iter()
        .map(|(network_id, ip_address_ids)| NetworkInterfaceArguments {
            network_id: Some(network_id),
            ip_address_ids,
            speed_profile: speed_profile.clone(),
            ..Default::default()
        })
        .chain(
            planned
                .virtual_network_ids()
                .into_iter()
                .map(|virtual_network_id| NetworkInterfaceArguments {
                    virtual_network_id: Some(virtual_network_id),
                    speed_profile: speed_profile.clone(),
                    ..Default::default()
                }),
        )
        .collect();

    Some(VirtualMachineBuildArguments {
        data_center: meta.data_center.clone(),
        package: Lookup::package(planned.package.as_str()),
        disk_template: Lookup::disk_template(planned.disk_template.as_str()),
        disk_template_options: planned.disk_template_options(),
        hostname: meta.use_or_generate_hostname(
            planned.hostname.as_deref_option().unwrap_or_default(),
        ),
        name: non_empty(&planned.name),
        description: non_empty(&planned.description),
        disks: planned.disks(),
        network_interfaces,
        group_id: non_empty(&planned.group_id),
        tag_names: planned.tags(),
        authorized_keys: AuthorizedKeys::all(),
    })
}

/// Allocate IP addresses on the interfaces attached to their network
async fn allocate_ips(
    diags: &mut Diagnostics,
    client: &dyn CoreApi,
    virtual_machine_id: &str,
    ip_address_ids: &[String],
) -> Option<()> {
    if ip_address_ids.is_empty() {
        return Some(());
    }
    let ifaces = checked(
        diags,
        "Failed to read virtual machine network interfaces",
        interfaces(client, virtual_machine_id).await,
    )?;

    for ip_address_id in ip_address_ids {
        let ip = checked(
            diags,
            "Failed to read IP address",
            client.get_ip_address(ip_address_id).await,
        )?;
        let Some(network) = ip.network else {
            diags.root_error(
                "Failed to allocate IP address",
                format!("could not determine network of IP ID: {ip_address_id}"),
            );
            return None;
        };
        let Some(iface) = ifaces.iter().find(|iface| {
            iface
                .network
                .as_ref()
                .is_some_and(|candidate| candidate.id == network.id)
        }) else {
            diags.root_error(
                "Failed to allocate IP address",
                format!("no usable network interface found for IP ID: {ip_address_id}"),
            );
            return None;
        };
        checked(
            diags,
            "Failed to allocate IP address",
            client.allocate_ip_address(&iface.id, ip_address_id).await,
        )?;
        debug!(ip_address_id, interface_id = iface.id, "IP address allocated");
    }
    Some(())
}

/// Attach and detach virtual networks to match `target`
async fn update_virtual_networks(
    diags: &mut Diagnostics,
    meta: &Meta,
    virtual_machine_id: &str,
    target: &[String],
) -> Option<()> {
    let client = meta.client.as_ref();
    let ifaces = checked(
        diags,
        "Failed to read virtual machine network interfaces",
        interfaces(client, virtual_machine_id).await,
    )?;
    let attached = ifaces
        .iter()
        .filter_map(|iface| Some((iface.virtual_network.as_ref()?.id.clone(), iface.id.clone())))
        .collect::<Vec<_>>();
    let current = attached
        .iter()
        .map(|(network, _)| network.clone())
        .collect::<Vec<_>>();
    let (added, removed) = strings_diff(&current, target);

    for virtual_network_id in added {
        let task = checked(
            diags,
            "Failed to attach virtual network",
            client
                .attach_virtual_network(virtual_machine_id, &virtual_network_id)
                .await,
        )?;
        wait_task(diags, meta, task, "Failed to attach virtual network").await?;
    }

    for (_, interface_id) in attached
        .iter()
        .filter(|(network, _)| removed.contains(network))
    {
        let task = checked(
            diags,
            "Failed to detach virtual network",
            api::optional(client.detach_virtual_network(interface_id).await),
        )?;
        if let Some(task) = task {
            wait_task(diags, meta, task, "Failed to detach virtual network").await?;
        }
    }
    Some(())
}

/// Set the speed profile of every interface
async fn update_speed_profile(
    diags: &mut Diagnostics,
    meta: &Meta,
    virtual_machine_id: &str,
    speed_profile: &str,
) -> Option<()> {
    let client = meta.client.as_ref();
    let lookup = Lookup::network_speed_profile(speed_profile);
    let ifaces = checked(
        diags,
        "Failed to read virtual machine network interfaces",
        interfaces(client, virtual_machine_id).await,
    )?;

    for iface in ifaces {
        match client.update_network_speed_profile(&iface.id, &lookup).await {
            Ok(task) => {
                wait_task(diags, meta, task, "Failed to update network speed profile").await?
            }
            Err(err) if err.code() == Some(SPEED_PROFILE_ALREADY_ASSIGNED) => {
                debug!(interface_id = iface.id, speed_profile, "speed profile already assigned");
            }
            Err(err) => {
                report_api_error(diags, "Failed to update network speed profile", &err);
                return None;
            }
        }
    }
    Some(())
}

#[async_trait]
impl Resource for VirtualMachineResource {
    type State<'a> = VirtualMachineState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VirtualMachineState::schema())
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
        let client = meta.client.as_ref();
        let id = state.id.as_str();
        let vm = found(
            diags,
            "Failed to read virtual machine",
            client.get_virtual_machine(id).await,
        )?;
        let ifaces = checked(
            diags,
            "Failed to read virtual machine network interfaces",
            interfaces(client, id).await,
        )?;
        Some((VirtualMachineState::flatten(vm, ifaces, &state), private_state))
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
        state.mark_computed_unknown();
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "package", &prior_state.package, &proposed_state.package);
        replace_if_changed(
            &mut triggers,
            "disk_template",
            &prior_state.disk_template,
            &proposed_state.disk_template,
        );
        replace_if_changed(
            &mut triggers,
            "disk_template_options",
            &prior_state.disk_template_options,
            &proposed_state.disk_template_options,
        );
        replace_if_changed(&mut triggers, "disk", &prior_state.disk, &proposed_state.disk);

        let mut state = proposed_state;
        if !triggers.is_empty() {
            state.id = Value::Unknown;
            state.mark_computed_unknown();
        } else {
            if prior_state.ip_address_ids != state.ip_address_ids {
                state.ip_addresses = Value::Unknown;
                state.network_interfaces = Value::Unknown;
            }
            if prior_state.virtual_network_ids != state.virtual_network_ids {
                state.network_interfaces = Value::Unknown;
            }
            if prior_state.hostname != state.hostname {
                state.fqdn = Value::Unknown;
            }
        }
        Some((state, prior_private_state, triggers))
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
        let args = build_arguments(diags, &meta, &planned_state).await?;

        let build = checked(
            diags,
            "Failed to build virtual machine",
            client.build_virtual_machine(&meta.organization, &args).await,
        )?;
        info!(build_id = build.id, hostname = args.hostname, "virtual machine build started");

        let built = Waiter::virtual_machine_build(meta.cancel_token())
            .with_timeout(CREATE_TIMEOUT)
            .wait(|| async {
                let build = client.get_virtual_machine_build(&build.id).await?;
                Ok((build.virtual_machine, build.state))
            })
            .await;
        let vm_ref = match built {
            Ok(Some(vm_ref)) => vm_ref,
            Ok(None) => {
                diags.root_error_short("Virtual machine build completed without a virtual machine");
                return None;
            }
            Err(err) => {
                report_wait_error(diags, "Failed to wait for virtual machine build", &err);
                return None;
            }
        };

        let started = Waiter::virtual_machine_started(meta.cancel_token())
            .with_timeout(CREATE_TIMEOUT)
            .wait(|| async {
                let vm = client.get_virtual_machine(&vm_ref.id).await?;
                let state = vm.state.clone();
                Ok((vm, state))
            })
            .await;
        let vm = match started {
            Ok(vm) => vm,
            Err(err) => {
                report_wait_error(diags, "Failed to wait for virtual machine to start", &err);
                return None;
            }
        };
        info!(id = vm.id, fqdn = vm.fqdn, "virtual machine started");

        // Only existing tags are assigned by the build
        let (missing, extra) = strings_diff(&vm.tag_names, &args.tag_names);
        if !missing.is_empty() || !extra.is_empty() {
            let update = VirtualMachineUpdate {
                tag_names: Some(args.tag_names.clone()),
                ..Default::default()
            };
            checked(
                diags,
                "Failed to assign virtual machine tags",
                client.update_virtual_machine(&vm.id, &update).await,
            )?;
        }

        let state = refresh(diags, client, &vm.id, &planned_state).await?;
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

        if prior_state.ip_address_ids != planned_state.ip_address_ids {
            let vm = checked(
                diags,
                "Failed to read virtual machine",
                client.get_virtual_machine(id).await,
            )?;
            let current = vm
                .ip_addresses
                .into_iter()
                .map(|ip| ip.id)
                .collect::<Vec<_>>();
            let (added, removed) = strings_diff(&current, &planned_state.ip_address_ids());

            allocate_ips(diags, client, id, &added).await?;
            for ip_address_id in removed {
                checked(
                    diags,
                    "Failed to unallocate IP address",
                    client.unallocate_ip_address(&ip_address_id).await,
                )?;
            }
        }

        if prior_state.virtual_network_ids != planned_state.virtual_network_ids {
            update_virtual_networks(diags, &meta, id, &planned_state.virtual_network_ids())
                .await?;
        }

        if prior_state.network_speed_profile != planned_state.network_speed_profile {
            if let Some(speed_profile) = non_empty(&planned_state.network_speed_profile) {
                update_speed_profile(diags, &meta, id, &speed_profile).await?;
            }
        }

        let mut args = VirtualMachineUpdate::default();
        if prior_state.name != planned_state.name {
            args.name = non_empty(&planned_state.name);
        }
        if prior_state.hostname != planned_state.hostname {
            args.hostname = non_empty(&planned_state.hostname);
        }
        if prior_state.description != planned_state.description {
            args.description = Some(
                planned_state
                    .description
                    .as_deref_option()
                    .unwrap_or_default()
                    .to_owned(),
            );
        }
        if prior_state.tags != planned_state.tags {
            args.tag_names = Some(planned_state.tags());
        }
        if prior_state.group_id != planned_state.group_id {
            args.group = Some(non_empty(&planned_state.group_id).map(|id| ObjectRef { id }));
        }

        if args != VirtualMachineUpdate::default() {
            checked(
                diags,
                "Failed to update virtual machine",
                client.update_virtual_machine(id, &args).await,
            )?;
        }

        let state = refresh(diags, client, id, &planned_state).await?;
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
        let id = state.id.as_str();
        let skip_purge = meta.skip_trash_object_purge;

        let (steps, hostname) = match meta.client.get_virtual_machine(id).await {
            Ok(vm) => match delete::plan(&vm.state, skip_purge) {
                Ok(steps) => (steps, vm.hostname),
                Err(err) => {
                    diags.root_error("Failed to delete virtual machine", err.to_string());
                    return None;
                }
            },
            Err(err) if err.is_not_found() => return Some(()),
            Err(ApiError::InTrash { .. }) => (delete::plan_in_trash(skip_purge), String::new()),
            Err(err) => {
                report_api_error(diags, "Failed to read virtual machine", &err);
                return None;
            }
        };

        let ip_address_ids = state.ip_address_ids();
        let deletion = Deletion {
            meta: &meta,
            id,
            hostname: &hostname,
            ip_address_ids: &ip_address_ids,
            timeout: DELETE_TIMEOUT,
        };
        match deletion.run(&steps).await {
            Ok(()) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete virtual machine", err.to_string());
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
        let state = refresh(diags, meta.client.as_ref(), &id, &Default::default()).await?;
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fake::FakeCore;
    use crate::api::{NetworkSpeedProfile, TrashObject, VirtualMachine, VirtualMachinePackage};
    use crate::meta::tests::{handle_with, meta_with};
    use crate::utils::{set_strings, string_set};

    fn fake() -> Arc<FakeCore> {
        let fake = Arc::new(FakeCore::default());
        {
            let mut state = fake.state();
            state.packages.push(VirtualMachinePackage {
                id: String::from("vmpkg_1"),
                permalink: String::from("rock-3"),
                ..Default::default()
            });
            state.speed_profiles.push(NetworkSpeedProfile {
                id: String::from("nsp_1"),
                permalink: String::from("1gbps"),
                ..Default::default()
            });
        }
        fake.add_ip("ip_1", "185.0.0.1", "netw_1");
        fake.add_ip("ip_2", "185.0.0.2", "netw_1");
        fake.add_ip("ip_3", "10.0.0.3", "netw_2");
        fake
    }

    fn config<'a>(ip_address_ids: &[&str]) -> VirtualMachineState<'a> {
        VirtualMachineState {
            hostname: Value::from("web-1"),
            package: Value::from("rock-3"),
            disk_template: Value::from("ubuntu-22-04"),
            ip_address_ids: string_set(ip_address_ids.iter().copied()),
            ..Default::default()
        }
    }

    async fn create<'a>(
        resource: &VirtualMachineResource,
        config: VirtualMachineState<'a>,
    ) -> VirtualMachineState<'a> {
        let mut diags = Diagnostics::default();
        let (planned, private) = resource
            .plan_create(&mut diags, config.clone(), config.clone(), ValueEmpty::Null)
            .await
            .unwrap();
        let (state, _) = resource
            .create(&mut diags, planned, config, private, ValueEmpty::Null)
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        state
    }

    async fn update<'a>(
        resource: &VirtualMachineResource,
        diags: &mut Diagnostics,
        prior: VirtualMachineState<'a>,
        planned: VirtualMachineState<'a>,
    ) -> Option<VirtualMachineState<'a>> {
        resource
            .update(
                diags,
                prior,
                planned.clone(),
                planned,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .map(|(state, _)| state)
    }

    #[tokio::test(start_paused = true)]
    async fn create_builds_and_applies_tags() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));

        let state = create(
            &resource,
            VirtualMachineState {
                tags: string_set(["web"]),
                virtual_network_ids: string_set(["vnet_1"]),
                network_speed_profile: Value::from("1gbps"),
                ..config(&["ip_1", "ip_3"])
            },
        )
        .await;

        let id = state.id.as_str().to_owned();
        assert!(id.starts_with("vm_"));
        assert_eq!(state.state.as_str(), "started");
        assert_eq!(state.fqdn.as_str(), "web-1.acme.example.net");
        assert_eq!(state.name.as_str(), "web-1");
        assert_eq!(state.package.as_str(), "rock-3");
        assert_eq!(state.network_speed_profile.as_str(), "1gbps");
        assert_eq!(set_strings(&state.tags), vec!["web"]);
        assert_eq!(set_strings(&state.ip_address_ids), vec!["ip_1", "ip_3"]);
        assert_eq!(
            set_strings(&state.ip_addresses),
            vec!["10.0.0.3", "185.0.0.1"]
        );
        assert_eq!(set_strings(&state.virtual_network_ids), vec!["vnet_1"]);
        assert_eq!(state.network_interfaces.iter().flatten().count(), 3);
        assert_eq!(
            fake.mutations(),
            vec![
                String::from("build_virtual_machine acme"),
                format!("update_virtual_machine {id}"),
            ]
        );

        let fake_state = fake.state();
        assert_eq!(fake_state.build_arguments.len(), 1);
        assert_eq!(
            fake_state.build_arguments[0].authorized_keys,
            AuthorizedKeys::all()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_without_tags_sends_only_the_build() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));

        let state = create(&resource, config(&["ip_1"])).await;
        assert!(state.tags.is_null());
        assert!(state.network_speed_profile.is_null());
        assert!(!state.hostname.is_unknown());
        assert_eq!(fake.mutations(), vec!["build_virtual_machine acme"]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_swaps_ips_and_sets_speed_profile() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let id = state.id.as_str().to_owned();
        let planned = VirtualMachineState {
            ip_address_ids: string_set(["ip_2"]),
            network_speed_profile: Value::from("1gbps"),
            ..state.clone()
        };

        let updated = update(&resource, &mut diags, state, planned).await.unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(set_strings(&updated.ip_address_ids), vec!["ip_2"]);
        assert_eq!(updated.network_speed_profile.as_str(), "1gbps");
        assert_eq!(
            fake.mutations()[1..],
            [
                format!("allocate_ip_address vmnet_{id}_0 ip_2"),
                String::from("unallocate_ip_address ip_1"),
                format!("update_network_speed_profile vmnet_{id}_0 1gbps"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn speed_profile_already_assigned_is_ignored() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let meta = meta_with(fake.clone(), false);
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let id = state.id.as_str();
        update_speed_profile(&mut diags, &meta, id, "1gbps").await.unwrap();
        update_speed_profile(&mut diags, &meta, id, "1gbps").await.unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");

        update_speed_profile(&mut diags, &meta, id, "10gbps").await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ip_without_matching_interface_is_an_error() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let planned = VirtualMachineState {
            ip_address_ids: string_set(["ip_1", "ip_3"]),
            ..state.clone()
        };

        assert!(update(&resource, &mut diags, state, planned).await.is_none());
        assert_eq!(diags.errors.len(), 1);
        // Details carry a backtrace when RUST_BACKTRACE is set
        assert!(
            diags.errors[0]
                .detail
                .starts_with("no usable network interface found for IP ID: ip_3"),
            "{diags:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_attaches_and_detaches_virtual_networks() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = create(
            &resource,
            VirtualMachineState {
                virtual_network_ids: string_set(["vnet_1"]),
                ..config(&["ip_1"])
            },
        )
        .await;
        let id = state.id.as_str().to_owned();
        let planned = VirtualMachineState {
            virtual_network_ids: string_set(["vnet_2"]),
            ..state.clone()
        };

        let updated = update(&resource, &mut diags, state, planned).await.unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(set_strings(&updated.virtual_network_ids), vec!["vnet_2"]);
        assert_eq!(
            fake.mutations()[1..],
            [
                format!("attach_virtual_network {id} vnet_2"),
                format!("detach_virtual_network vmnet_{id}_1"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_patches_attributes() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let planned = VirtualMachineState {
            name: Value::from("api"),
            description: Value::from("API server"),
            group_id: Value::from("vmgrp_1"),
            tags: string_set(["api"]),
            ..state.clone()
        };

        let updated = update(&resource, &mut diags, state.clone(), planned.clone())
            .await
            .unwrap();
        assert_eq!(updated.name.as_str(), "api");
        assert_eq!(updated.description.as_str(), "API server");
        assert_eq!(updated.group_id.as_str(), "vmgrp_1");
        assert_eq!(set_strings(&updated.tags), vec!["api"]);

        let ungrouped = VirtualMachineState {
            group_id: Value::Null,
            ..updated.clone()
        };
        let updated = update(&resource, &mut diags, updated, ungrouped)
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(updated.group_id.is_null());
        assert_eq!(fake.mutations().len(), 3);
    }

    #[tokio::test]
    async fn replacement_attributes() {
        let resource = VirtualMachineResource::default();
        let mut diags = Diagnostics::default();
        let prior = VirtualMachineState {
            id: Value::from("vm_1"),
            fqdn: Value::from("web-1.acme.example.net"),
            ..config(&["ip_1"])
        };

        let proposed = VirtualMachineState {
            hostname: Value::from("web-2"),
            ..prior.clone()
        };
        let (planned, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed.clone(),
                proposed,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert!(triggers.is_empty());
        assert_eq!(planned.id.as_str(), "vm_1");
        assert!(planned.fqdn.is_unknown());

        let proposed = VirtualMachineState {
            disk_template: Value::from("debian-12"),
            ..prior.clone()
        };
        let (planned, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                ValueEmpty::Null,
                ValueEmpty::Null,
            )
            .await
            .unwrap();
        assert_eq!(triggers, vec![AttributePath::new("disk_template")]);
        assert!(planned.id.is_unknown());
        assert!(planned.state.is_unknown());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_started_machine_purges_it() {
        let fake = fake();
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let id = state.id.as_str().to_owned();
        resource
            .destroy(&mut diags, state, ValueEmpty::Null, ValueEmpty::Null)
            .await
            .unwrap();

        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(
            fake.mutations()[1..],
            [
                format!("stop_virtual_machine {id}"),
                format!("delete_virtual_machine {id}"),
                String::from("unallocate_ip_address ip_1"),
                format!("purge_trash_object {id}"),
            ]
        );
        assert!(fake.state().trash.is_empty());
        assert!(fake.state().virtual_machines.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_without_purge_renames_and_keeps_trash() {
        let fake = fake();
        let handle = MetaHandle::default();
        handle.set(meta_with(fake.clone(), true));
        let resource = VirtualMachineResource::new(handle);
        let mut diags = Diagnostics::default();

        let state = create(&resource, config(&["ip_1"])).await;
        let id = state.id.as_str().to_owned();
        resource
            .destroy(&mut diags, state, ValueEmpty::Null, ValueEmpty::Null)
            .await
            .unwrap();

        assert_eq!(
            fake.mutations()[1..],
            [
                format!("stop_virtual_machine {id}"),
                format!("update_virtual_machine {id}"),
                format!("delete_virtual_machine {id}"),
                String::from("unallocate_ip_address ip_1"),
            ]
        );
        assert!(fake.state().trash.contains_key(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_trashed_machine_only_purges() {
        let fake = fake();
        fake.state().trash.insert(
            String::from("vm_9"),
            TrashObject {
                id: String::from("trsh_1"),
                object_id: String::from("vm_9"),
                object_type: String::from("VirtualMachine"),
                ..Default::default()
            },
        );
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = VirtualMachineState {
            id: Value::from("vm_9"),
            ..config(&["ip_1"])
        };
        resource
            .destroy(&mut diags, state, ValueEmpty::Null, ValueEmpty::Null)
            .await
            .unwrap();
        assert_eq!(fake.mutations(), vec!["purge_trash_object vm_9"]);
    }

    #[tokio::test]
    async fn delete_in_transient_state_is_an_error() {
        let fake = fake();
        fake.add_virtual_machine(
            VirtualMachine {
                id: String::from("vm_9"),
                hostname: String::from("web-9"),
                state: String::from("migrating"),
                ..Default::default()
            },
            &["netw_1"],
        );
        let resource = VirtualMachineResource::new(handle_with(fake.clone()));
        let mut diags = Diagnostics::default();

        let state = VirtualMachineState {
            id: Value::from("vm_9"),
            ..config(&["ip_1"])
        };
        assert!(resource
            .destroy(&mut diags, state, ValueEmpty::Null, ValueEmpty::Null)
            .await
            .is_none());
        // Details carry a backtrace when RUST_BACKTRACE is set
        assert!(
            diags.errors[0]
                .detail
                .starts_with("cannot delete virtual machine in state: migrating"),
            "{diags:?}"
        );
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn read_of_missing_machine_clears_state() {
        let resource = VirtualMachineResource::new(handle_with(fake()));
        let mut diags = Diagnostics::default();

        let state = VirtualMachineState {
            id: Value::from("vm_gone"),
            ..config(&["ip_1"])
        };
        let read = resource
            .read(&mut diags, state, ValueEmpty::Null, ValueEmpty::Null)
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }
}
