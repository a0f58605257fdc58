use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

/// Reference to an API object, either by id or by a human readable key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    Id(String),
    Permalink(String),
}

impl Lookup {
    /// Build a lookup from a user supplied value: ids are recognized by their prefix
    pub fn from_prefixed(value: &str, id_prefix: &str) -> Self {
        if value.starts_with(id_prefix) {
            Self::Id(value.to_owned())
        } else {
            Self::Permalink(value.to_owned())
        }
    }

    /// Organizations are referenced by `sub_domain` rather than `permalink`
    pub fn organization(value: &str) -> Self {
        Self::from_prefixed(value, "org_")
    }

    pub fn data_center(value: &str) -> Self {
        Self::from_prefixed(value, "dc_")
    }

    pub fn package(value: &str) -> Self {
        Self::from_prefixed(value, "vmpkg_")
    }

    pub fn network_speed_profile(value: &str) -> Self {
        Self::from_prefixed(value, "nsp_")
    }

    /// Disk templates given by permalink without a namespace live under `templates/`
    pub fn disk_template(value: &str) -> Self {
        if value.starts_with("dtpl_") {
            Self::Id(value.to_owned())
        } else if value.contains('/') {
            Self::Permalink(value.to_owned())
        } else {
            Self::Permalink(format!("templates/{value}"))
        }
    }

    /// Query parameter encoding: `entity[id]=...` or `entity[key]=...`
    pub fn query(&self, entity: &str, key: &str) -> (String, String) {
        match self {
            Self::Id(id) => (format!("{entity}[id]"), id.clone()),
            Self::Permalink(value) => (format!("{entity}[{key}]"), value.clone()),
        }
    }

    /// Body encoding: `{"id": ...}` or `{key: ...}`
    pub fn json(&self, key: &str) -> Json {
        match self {
            Self::Id(id) => json!({ "id": id }),
            Self::Permalink(value) => {
                let mut object = serde_json::Map::new();
                object.insert(key.to_owned(), Json::String(value.clone()));
                Json::Object(object)
            }
        }
    }
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(s) | Self::Permalink(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub per_page: u32,
}

/// One page of a list endpoint
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Country {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCenter {
    pub id: String,
    pub name: String,
    pub permalink: String,
    pub country: Option<Country>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub permalink: String,
    pub data_center: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskTemplateVersion {
    pub id: String,
    pub number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatingSystem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub permalink: String,
    pub universal: bool,
    pub latest_version: Option<DiskTemplateVersion>,
    pub operating_system: Option<OperatingSystem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachinePackage {
    pub id: String,
    pub name: String,
    pub permalink: String,
    pub cpu_cores: i64,
    pub ipv4_addresses: i64,
    pub memory_in_gb: i64,
    pub storage_in_gb: i64,
    pub privacy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpeedProfile {
    pub id: String,
    pub name: String,
    pub permalink: String,
    pub upload_speed_in_mbit: i64,
    pub download_speed_in_mbit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAddress {
    pub id: String,
    pub address: String,
    pub address_with_mask: String,
    pub reverse_dns: String,
    pub vip: bool,
    pub label: String,
    pub network: Option<Network>,
    pub allocation_type: Option<String>,
    pub allocation_id: Option<String>,
}

impl IpAddress {
    /// Addresses with at least two colons are IPv6
    pub fn version(&self) -> i64 {
        if self.address.matches(':').count() >= 2 {
            6
        } else {
            4
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

impl IpVersion {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAddressArguments {
    pub network_id: String,
    pub version: IpVersion,
    pub vip: Option<bool>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IpAddressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachineGroup {
    pub id: String,
    pub name: String,
    pub segregate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtualMachineGroupArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segregate: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub resource_type: String,
    pub resource_ids: Vec<String>,
    pub ip_address: Option<IpAddress>,
    pub https_redirect: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadBalancerArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerRule {
    pub id: String,
    pub algorithm: String,
    pub destination_port: i64,
    pub listen_port: i64,
    pub protocol: String,
    pub proxy_protocol: bool,
    pub certificates: Vec<ObjectRef>,
    pub backend_ssl: bool,
    pub passthrough_ssl: bool,
    pub check_enabled: bool,
    pub check_fall: i64,
    pub check_interval: i64,
    pub check_path: String,
    pub check_protocol: String,
    pub check_rise: i64,
    pub check_timeout: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadBalancerRuleArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_protocol: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<ObjectRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_ssl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passthrough_ssl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_fall: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_rise: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub allow_all_inbound: bool,
    pub allow_all_outbound: bool,
    pub associations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityGroupArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_all_inbound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_all_outbound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group: Option<ObjectRef>,
    pub direction: String,
    pub protocol: String,
    pub ports: Option<String>,
    pub targets: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityGroupRuleArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashObject {
    pub id: String,
    pub keep_until: Option<i64>,
    pub object_id: String,
    pub object_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachineBuild {
    pub id: String,
    pub state: String,
    pub virtual_machine: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub description: String,
    pub fqdn: String,
    pub state: String,
    pub package: Option<VirtualMachinePackage>,
    pub ip_addresses: Vec<IpAddress>,
    pub group: Option<ObjectRef>,
    pub tag_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtualMachineUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `Some(None)` removes the machine from its group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Option<ObjectRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachineNetworkInterface {
    pub id: String,
    pub network: Option<Network>,
    pub virtual_network: Option<ObjectRef>,
    pub mac_address: String,
    pub ip_addresses: Vec<IpAddress>,
    pub speed_profile: Option<NetworkSpeedProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskArguments {
    pub name: String,
    pub size_in_gb: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterfaceArguments {
    pub network_id: Option<String>,
    pub virtual_network_id: Option<String>,
    pub ip_address_ids: Vec<String>,
    pub speed_profile: Option<Lookup>,
}

/// Users and SSH keys granted access to a new machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizedKeys {
    pub all_ssh_keys: bool,
    pub all_users: bool,
}

impl AuthorizedKeys {
    /// Every SSH key and user of the organization
    pub fn all() -> Self {
        Self {
            all_ssh_keys: true,
            all_users: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineBuildArguments {
    pub data_center: Lookup,
    pub package: Lookup,
    pub disk_template: Lookup,
    pub disk_template_options: BTreeMap<String, String>,
    pub hostname: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub disks: Vec<DiskArguments>,
    pub network_interfaces: Vec<NetworkInterfaceArguments>,
    pub group_id: Option<String>,
    pub tag_names: Vec<String>,
    pub authorized_keys: AuthorizedKeys,
}
