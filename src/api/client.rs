use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::*;

pub const DEFAULT_API_URL: &str = "https://api.katapult.io/core/v1/";

/// Retry policy for transient HTTP failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `min_wait * 2^attempt`, capped at `max_wait`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Aborts the wait between two retries
    pub cancel: CancellationToken,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::from(DEFAULT_API_URL),
            user_agent: format!("terraform-provider-katapult/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Katapult Core API client
#[derive(Debug, Clone)]
pub struct KatapultClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

type Query = Vec<(String, String)>;

fn query<K: Into<String>, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> Query {
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

fn with_page(mut query: Query, page: u32) -> Query {
    query.push((String::from("page"), page.to_string()));
    query
}

fn field(json: &mut Json, key: &str) -> Result<Json> {
    json.as_object_mut()
        .and_then(|fields| fields.remove(key))
        .ok_or_else(|| ApiError::MissingField(key.to_owned()))
}

fn extract<T: DeserializeOwned>(mut json: Json, key: &str) -> Result<T> {
    Ok(serde_json::from_value(field(&mut json, key)?)?)
}

fn extract_page<T: DeserializeOwned>(mut json: Json, key: &str) -> Result<Page<T>> {
    let items = serde_json::from_value(field(&mut json, key)?)?;
    let pagination = field(&mut json, "pagination")
        .ok()
        .and_then(|pagination| serde_json::from_value(pagination).ok())
        .unwrap_or_default();
    Ok(Page { items, pagination })
}

impl KatapultClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url,
            api_key: options.api_key,
            retry: options.retry,
            cancel: options.cancel,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Sleep before a retry, unless the client is cancelled first
    async fn pause(&self, wait: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Json>,
    ) -> Result<Json> {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, %url, attempt, "katapult request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        if bytes.is_empty() {
                            return Ok(Json::Null);
                        }
                        return Ok(serde_json::from_slice(&bytes)?);
                    }

                    if RetryPolicy::is_retryable(status) && attempt < self.retry.max_retries {
                        let wait = response
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|value| value.to_str().ok())
                            .and_then(|value| value.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .map(|wait| wait.min(self.retry.max_wait))
                            .unwrap_or_else(|| self.retry.backoff(attempt));
                        warn!(%url, status = status.as_u16(), attempt, ?wait, "retrying request");
                        self.pause(wait).await?;
                        attempt += 1;
                        continue;
                    }

                    let bytes = response.bytes().await?;
                    return Err(ApiError::from_response(status.as_u16(), &bytes));
                }
                Err(err)
                    if (err.is_connect() || err.is_timeout())
                        && attempt < self.retry.max_retries =>
                {
                    let wait = self.retry.backoff(attempt);
                    warn!(%url, error = %err, attempt, ?wait, "retrying request");
                    self.pause(wait).await?;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Query, key: &str) -> Result<T> {
        extract(self.send(Method::GET, path, &query, None).await?, key)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
        page: u32,
        key: &str,
    ) -> Result<Page<T>> {
        let query = with_page(query, page);
        extract_page(self.send(Method::GET, path, &query, None).await?, key)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Json,
        key: &str,
    ) -> Result<T> {
        extract(self.send(method, path, &Query::new(), Some(&body)).await?, key)
    }

    async fn call_empty(&self, method: Method, path: &str, body: Json) -> Result<()> {
        self.send(method, path, &Query::new(), Some(&body)).await?;
        Ok(())
    }
}

fn organization_json(organization: &Lookup) -> Json {
    organization.json("sub_domain")
}

fn build_json(organization: &Lookup, args: &VirtualMachineBuildArguments) -> Json {
    let disk_template_options = args
        .disk_template_options
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect::<Vec<_>>();
    let disks = args
        .disks
        .iter()
        .map(|disk| json!({ "name": disk.name, "size_in_gb": disk.size_in_gb }))
        .collect::<Vec<_>>();
    let network_interfaces = args
        .network_interfaces
        .iter()
        .map(|iface| {
            let mut value = json!({
                "ip_addresses": iface
                    .ip_address_ids
                    .iter()
                    .map(|id| json!({ "id": id }))
                    .collect::<Vec<_>>(),
            });
            if let Some(network_id) = &iface.network_id {
                value["network"] = json!({ "id": network_id });
            }
            if let Some(virtual_network_id) = &iface.virtual_network_id {
                value["virtual_network"] = json!({ "id": virtual_network_id });
            }
            if let Some(speed_profile) = &iface.speed_profile {
                value["speed_profile"] = speed_profile.json("permalink");
            }
            value
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "organization": organization_json(organization),
        "data_center": args.data_center.json("permalink"),
        "package": args.package.json("permalink"),
        "disk_template": args.disk_template.json("permalink"),
        "disk_template_options": disk_template_options,
        "hostname": args.hostname,
        "disks": disks,
        "network_interfaces": network_interfaces,
        "tags": args.tag_names,
        "authorized_keys": args.authorized_keys,
    });
    if let Some(name) = &args.name {
        body["name"] = json!(name);
    }
    if let Some(description) = &args.description {
        body["description"] = json!(description);
    }
    if let Some(group_id) = &args.group_id {
        body["group"] = json!({ "id": group_id });
    }
    body
}

#[async_trait]
impl CoreApi for KatapultClient {
    async fn get_task(&self, id: &str) -> Result<Task> {
        self.get("tasks/_", query([("task[id]", id)]), "task").await
    }

    async fn get_trash_object(&self, object_id: &str) -> Result<TrashObject> {
        self.get(
            "trash_objects/_",
            query([("trash_object[object_id]", object_id)]),
            "trash_object",
        )
        .await
    }

    async fn purge_trash_object(&self, object_id: &str) -> Result<Task> {
        self.call(
            Method::DELETE,
            "trash_objects/_",
            json!({ "trash_object": { "object_id": object_id } }),
            "task",
        )
        .await
    }

    async fn get_data_center(&self, data_center: &Lookup) -> Result<DataCenter> {
        self.get(
            "data_centers/_",
            vec![data_center.query("data_center", "permalink")],
            "data_center",
        )
        .await
    }

    async fn get_default_network(&self, data_center: &Lookup) -> Result<Network> {
        self.get(
            "data_centers/_/default_network",
            vec![data_center.query("data_center", "permalink")],
            "network",
        )
        .await
    }

    async fn get_network(&self, network: &Lookup) -> Result<Network> {
        self.get(
            "networks/_",
            vec![network.query("network", "permalink")],
            "network",
        )
        .await
    }

    async fn list_networks(&self, organization: &Lookup) -> Result<Vec<Network>> {
        self.get(
            "organizations/_/available_networks",
            vec![organization.query("organization", "sub_domain")],
            "networks",
        )
        .await
    }

    async fn list_disk_templates(
        &self,
        organization: &Lookup,
        include_universal: bool,
        page: u32,
    ) -> Result<Page<DiskTemplate>> {
        self.get_page(
            "organizations/_/disk_templates",
            vec![
                organization.query("organization", "sub_domain"),
                (
                    String::from("include_universal"),
                    include_universal.to_string(),
                ),
            ],
            page,
            "disk_templates",
        )
        .await
    }

    async fn list_virtual_machine_packages(&self, page: u32) -> Result<Page<VirtualMachinePackage>> {
        self.get_page(
            "virtual_machine_packages",
            Query::new(),
            page,
            "virtual_machine_packages",
        )
        .await
    }

    async fn get_virtual_machine_package(&self, package: &Lookup) -> Result<VirtualMachinePackage> {
        self.get(
            "virtual_machine_packages/_",
            vec![package.query("virtual_machine_package", "permalink")],
            "virtual_machine_package",
        )
        .await
    }

    async fn list_network_speed_profiles(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<NetworkSpeedProfile>> {
        self.get_page(
            "organizations/_/network_speed_profiles",
            vec![organization.query("organization", "sub_domain")],
            page,
            "network_speed_profiles",
        )
        .await
    }

    async fn create_ip_address(
        &self,
        organization: &Lookup,
        args: &IpAddressArguments,
    ) -> Result<IpAddress> {
        let mut body = json!({
            "organization": organization_json(organization),
            "network": { "id": args.network_id },
            "version": args.version.as_api_str(),
        });
        if let Some(vip) = args.vip {
            body["vip"] = json!(vip);
        }
        if let Some(label) = &args.label {
            body["label"] = json!(label);
        }
        self.call(
            Method::POST,
            "organizations/_/ip_addresses",
            body,
            "ip_address",
        )
        .await
    }

    async fn get_ip_address(&self, id: &str) -> Result<IpAddress> {
        self.get("ip_addresses/_", query([("ip_address[id]", id)]), "ip_address")
            .await
    }

    async fn find_ip_address(&self, address: &str) -> Result<IpAddress> {
        self.get(
            "ip_addresses/_",
            query([("ip_address[address]", address)]),
            "ip_address",
        )
        .await
    }

    async fn update_ip_address(&self, id: &str, args: &IpAddressUpdate) -> Result<IpAddress> {
        self.call(
            Method::PATCH,
            "ip_addresses/_",
            json!({ "ip_address": { "id": id }, "properties": args }),
            "ip_address",
        )
        .await
    }

    async fn delete_ip_address(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "ip_addresses/_",
            json!({ "ip_address": { "id": id } }),
        )
        .await
    }

    async fn unallocate_ip_address(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::POST,
            "ip_addresses/_/unallocate",
            json!({ "ip_address": { "id": id } }),
        )
        .await
    }

    async fn create_virtual_machine_group(
        &self,
        organization: &Lookup,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup> {
        self.call(
            Method::POST,
            "organizations/_/virtual_machine_groups",
            json!({ "organization": organization_json(organization), "properties": args }),
            "virtual_machine_group",
        )
        .await
    }

    async fn get_virtual_machine_group(&self, id: &str) -> Result<VirtualMachineGroup> {
        self.get(
            "virtual_machine_groups/_",
            query([("virtual_machine_group[id]", id)]),
            "virtual_machine_group",
        )
        .await
    }

    async fn update_virtual_machine_group(
        &self,
        id: &str,
        args: &VirtualMachineGroupArguments,
    ) -> Result<VirtualMachineGroup> {
        self.call(
            Method::PATCH,
            "virtual_machine_groups/_",
            json!({ "virtual_machine_group": { "id": id }, "properties": args }),
            "virtual_machine_group",
        )
        .await
    }

    async fn delete_virtual_machine_group(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "virtual_machine_groups/_",
            json!({ "virtual_machine_group": { "id": id } }),
        )
        .await
    }

    async fn list_virtual_machine_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<VirtualMachineGroup>> {
        self.get_page(
            "organizations/_/virtual_machine_groups",
            vec![organization.query("organization", "sub_domain")],
            page,
            "virtual_machine_groups",
        )
        .await
    }

    async fn create_load_balancer(
        &self,
        organization: &Lookup,
        data_center: &Lookup,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer> {
        let mut properties = json!(args);
        properties["data_center"] = data_center.json("permalink");
        self.call(
            Method::POST,
            "organizations/_/load_balancers",
            json!({ "organization": organization_json(organization), "properties": properties }),
            "load_balancer",
        )
        .await
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer> {
        self.get(
            "load_balancers/_",
            query([("load_balancer[id]", id)]),
            "load_balancer",
        )
        .await
    }

    async fn update_load_balancer(
        &self,
        id: &str,
        args: &LoadBalancerArguments,
    ) -> Result<LoadBalancer> {
        self.call(
            Method::PATCH,
            "load_balancers/_",
            json!({ "load_balancer": { "id": id }, "properties": args }),
            "load_balancer",
        )
        .await
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "load_balancers/_",
            json!({ "load_balancer": { "id": id } }),
        )
        .await
    }

    async fn list_load_balancers(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<LoadBalancer>> {
        self.get_page(
            "organizations/_/load_balancers",
            vec![organization.query("organization", "sub_domain")],
            page,
            "load_balancers",
        )
        .await
    }

    async fn create_load_balancer_rule(
        &self,
        load_balancer_id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule> {
        self.call(
            Method::POST,
            "load_balancers/_/rules",
            json!({ "load_balancer": { "id": load_balancer_id }, "properties": args }),
            "load_balancer_rule",
        )
        .await
    }

    async fn get_load_balancer_rule(&self, id: &str) -> Result<LoadBalancerRule> {
        self.get(
            "load_balancers/rules/_",
            query([("load_balancer_rule[id]", id)]),
            "load_balancer_rule",
        )
        .await
    }

    async fn update_load_balancer_rule(
        &self,
        id: &str,
        args: &LoadBalancerRuleArguments,
    ) -> Result<LoadBalancerRule> {
        self.call(
            Method::PATCH,
            "load_balancers/rules/_",
            json!({ "load_balancer_rule": { "id": id }, "properties": args }),
            "load_balancer_rule",
        )
        .await
    }

    async fn delete_load_balancer_rule(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "load_balancers/rules/_",
            json!({ "load_balancer_rule": { "id": id } }),
        )
        .await
    }

    async fn list_load_balancer_rules(
        &self,
        load_balancer_id: &str,
        page: u32,
    ) -> Result<Page<LoadBalancerRule>> {
        self.get_page(
            "load_balancers/_/rules",
            query([("load_balancer[id]", load_balancer_id)]),
            page,
            "load_balancer_rules",
        )
        .await
    }

    async fn create_security_group(
        &self,
        organization: &Lookup,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup> {
        self.call(
            Method::POST,
            "organizations/_/security_groups",
            json!({ "organization": organization_json(organization), "properties": args }),
            "security_group",
        )
        .await
    }

    async fn get_security_group(&self, id: &str) -> Result<SecurityGroup> {
        self.get(
            "security_groups/_",
            query([("security_group[id]", id)]),
            "security_group",
        )
        .await
    }

    async fn update_security_group(
        &self,
        id: &str,
        args: &SecurityGroupArguments,
    ) -> Result<SecurityGroup> {
        self.call(
            Method::PATCH,
            "security_groups/_",
            json!({ "security_group": { "id": id }, "properties": args }),
            "security_group",
        )
        .await
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "security_groups/_",
            json!({ "security_group": { "id": id } }),
        )
        .await
    }

    async fn list_security_groups(
        &self,
        organization: &Lookup,
        page: u32,
    ) -> Result<Page<SecurityGroup>> {
        self.get_page(
            "organizations/_/security_groups",
            vec![organization.query("organization", "sub_domain")],
            page,
            "security_groups",
        )
        .await
    }

    async fn list_security_group_rules(
        &self,
        security_group_id: &str,
        page: u32,
    ) -> Result<Page<SecurityGroupRule>> {
        self.get_page(
            "security_groups/_/rules",
            query([("security_group[id]", security_group_id)]),
            page,
            "security_group_rules",
        )
        .await
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule> {
        self.call(
            Method::POST,
            "security_groups/_/rules",
            json!({ "security_group": { "id": security_group_id }, "properties": args }),
            "security_group_rule",
        )
        .await
    }

    async fn get_security_group_rule(&self, id: &str) -> Result<SecurityGroupRule> {
        self.get(
            "security_groups/rules/_",
            query([("security_group_rule[id]", id)]),
            "security_group_rule",
        )
        .await
    }

    async fn update_security_group_rule(
        &self,
        id: &str,
        args: &SecurityGroupRuleArguments,
    ) -> Result<SecurityGroupRule> {
        self.call(
            Method::PATCH,
            "security_groups/rules/_",
            json!({ "security_group_rule": { "id": id }, "properties": args }),
            "security_group_rule",
        )
        .await
    }

    async fn delete_security_group_rule(&self, id: &str) -> Result<()> {
        self.call_empty(
            Method::DELETE,
            "security_groups/rules/_",
            json!({ "security_group_rule": { "id": id } }),
        )
        .await
    }

    async fn build_virtual_machine(
        &self,
        organization: &Lookup,
        args: &VirtualMachineBuildArguments,
    ) -> Result<VirtualMachineBuild> {
        self.call(
            Method::POST,
            "organizations/_/virtual_machines/build",
            build_json(organization, args),
            "virtual_machine_build",
        )
        .await
    }

    async fn get_virtual_machine_build(&self, id: &str) -> Result<VirtualMachineBuild> {
        self.get(
            "virtual_machines/builds/_",
            query([("virtual_machine_build[id]", id)]),
            "virtual_machine_build",
        )
        .await
    }

    async fn get_virtual_machine(&self, id: &str) -> Result<VirtualMachine> {
        self.get(
            "virtual_machines/_",
            query([("virtual_machine[id]", id)]),
            "virtual_machine",
        )
        .await
    }

    async fn find_virtual_machine(&self, fqdn: &str) -> Result<VirtualMachine> {
        self.get(
            "virtual_machines/_",
            query([("virtual_machine[fqdn]", fqdn)]),
            "virtual_machine",
        )
        .await
    }

    async fn update_virtual_machine(
        &self,
        id: &str,
        args: &VirtualMachineUpdate,
    ) -> Result<VirtualMachine> {
        self.call(
            Method::PATCH,
            "virtual_machines/_",
            json!({ "virtual_machine": { "id": id }, "properties": args }),
            "virtual_machine",
        )
        .await
    }

    async fn stop_virtual_machine(&self, id: &str) -> Result<Task> {
        self.call(
            Method::POST,
            "virtual_machines/_/stop",
            json!({ "virtual_machine": { "id": id } }),
            "task",
        )
        .await
    }

    async fn delete_virtual_machine(&self, id: &str) -> Result<TrashObject> {
        self.call(
            Method::DELETE,
            "virtual_machines/_",
            json!({ "virtual_machine": { "id": id } }),
            "trash_object",
        )
        .await
    }

    async fn list_virtual_machine_network_interfaces(
        &self,
        virtual_machine_id: &str,
        page: u32,
    ) -> Result<Page<VirtualMachineNetworkInterface>> {
        self.get_page(
            "virtual_machines/_/network_interfaces",
            query([("virtual_machine[id]", virtual_machine_id)]),
            page,
            "virtual_machine_network_interfaces",
        )
        .await
    }

    async fn allocate_ip_address(&self, interface_id: &str, ip_address_id: &str) -> Result<()> {
        self.call_empty(
            Method::POST,
            "virtual_machine_network_interfaces/_/allocate_ip",
            json!({
                "virtual_machine_network_interface": { "id": interface_id },
                "ip_address": { "id": ip_address_id },
            }),
        )
        .await
    }

    async fn attach_virtual_network(
        &self,
        virtual_machine_id: &str,
        virtual_network_id: &str,
    ) -> Result<Task> {
        self.call(
            Method::POST,
            "virtual_machines/_/network_interfaces/attach_to_virtual_network",
            json!({
                "virtual_machine": { "id": virtual_machine_id },
                "virtual_network": { "id": virtual_network_id },
            }),
            "task",
        )
        .await
    }

    async fn detach_virtual_network(&self, interface_id: &str) -> Result<Task> {
        self.call(
            Method::POST,
            "virtual_machine_network_interfaces/_/detach_from_virtual_network",
            json!({ "virtual_machine_network_interface": { "id": interface_id } }),
            "task",
        )
        .await
    }

    async fn update_network_speed_profile(
        &self,
        interface_id: &str,
        speed_profile: &Lookup,
    ) -> Result<Task> {
        self.call(
            Method::PATCH,
            "virtual_machine_network_interfaces/_/update_speed_profile",
            json!({
                "virtual_machine_network_interface": { "id": interface_id },
                "speed_profile": speed_profile.json("permalink"),
            }),
            "task",
        )
        .await
    }
}
