use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::path::Path;

use crate::model::{ContainerUsage, NodeUsage, PodUsage};

/// Read-only view of a cluster, as consumed by the aggregator.
///
/// `namespace`/`node` arguments narrow server-side when `Some`; `None`
/// means every namespace or node.
pub trait ClusterSource {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn get_node(&self, name: &str) -> Result<Node>;
    async fn list_pods(&self, namespace: Option<&str>, node: Option<&str>) -> Result<Vec<Pod>>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;
    async fn node_metrics(&self) -> Result<Vec<NodeUsage>>;
    async fn pod_metrics(&self, namespace: Option<&str>) -> Result<Vec<PodUsage>>;
    async fn pod_metrics_for(&self, namespace: &str, name: &str) -> Result<PodUsage>;
    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_object: Option<&str>,
    ) -> Result<Vec<Event>>;
    async fn get_event(&self, namespace: &str, name: &str) -> Result<Event>;
    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: i64,
    ) -> Result<String>;
    async fn list_namespaces(&self) -> Result<Vec<String>>;
    fn cluster_identity(&self) -> &str;
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    cluster: String,
    context: String,
}

impl KubeGateway {
    /// Resolves a client from an explicit kubeconfig, the default kubeconfig,
    /// or the in-cluster environment, in that order.
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<String>) -> Result<Self> {
        let kubeconfig_value = match kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let config = if let Some(kubeconfig_value) = kubeconfig_value.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context needs a kubeconfig file");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = context
            .or_else(|| kubeconfig_value.and_then(|cfg| cfg.current_context))
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            cluster,
            context,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    fn pods_api(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn pod_metrics_api(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

impl ClusterSource for KubeGateway {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        list_all(&nodes, list_params())
            .await
            .context("failed to list nodes")
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        nodes
            .get(name)
            .await
            .with_context(|| format!("failed to fetch node {name}"))
    }

    async fn list_pods(&self, namespace: Option<&str>, node: Option<&str>) -> Result<Vec<Pod>> {
        let mut params = list_params();
        if let Some(node) = node {
            params = params.fields(&format!("spec.nodeName={node}"));
        }
        list_all(&self.pods_api(namespace), params)
            .await
            .with_context(|| format!("failed to list pods in {}", scope_label(namespace)))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.pods_api(Some(namespace))
            .get(name)
            .await
            .with_context(|| format!("failed to fetch pod {namespace}/{name}"))
    }

    async fn node_metrics(&self) -> Result<Vec<NodeUsage>> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "nodes");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let list = list_all(&api, list_params())
            .await
            .context("failed to list node metrics")?;

        Ok(list
            .into_iter()
            .map(|metric| {
                let (cpu_millis, memory_bytes) = parse_usage_from_value(&metric.data["usage"]);
                NodeUsage {
                    name: metric.name_any(),
                    cpu_millis,
                    memory_bytes,
                }
            })
            .collect())
    }

    async fn pod_metrics(&self, namespace: Option<&str>) -> Result<Vec<PodUsage>> {
        let list = list_all(&self.pod_metrics_api(namespace), list_params())
            .await
            .with_context(|| format!("failed to list pod metrics in {}", scope_label(namespace)))?;
        Ok(list.iter().map(pod_usage_from_object).collect())
    }

    async fn pod_metrics_for(&self, namespace: &str, name: &str) -> Result<PodUsage> {
        let metric = self
            .pod_metrics_api(Some(namespace))
            .get(name)
            .await
            .with_context(|| format!("failed to fetch metrics for pod {namespace}/{name}"))?;
        Ok(pod_usage_from_object(&metric))
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_object: Option<&str>,
    ) -> Result<Vec<Event>> {
        let events: Api<Event> = match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let mut params = list_params();
        if let Some(object) = involved_object {
            params = params.fields(&format!("involvedObject.name={object}"));
        }
        list_all(&events, params)
            .await
            .with_context(|| format!("failed to list events in {}", scope_label(namespace)))
    }

    async fn get_event(&self, namespace: &str, name: &str) -> Result<Event> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        events
            .get(name)
            .await
            .with_context(|| format!("failed to fetch event {namespace}/{name}"))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: i64,
    ) -> Result<String> {
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        self.pods_api(Some(namespace))
            .logs(pod, &params)
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{pod}:{container}"))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = list_all(&namespaces, list_params())
            .await
            .context("failed to list namespaces")?;
        let mut names = list.iter().map(ResourceExt::name_any).collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn cluster_identity(&self) -> &str {
        &self.cluster
    }
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

/// Lists every item, following `continue` tokens until the server reports
/// the last page.
async fn list_all<K>(api: &Api<K>, mut params: ListParams) -> kube::Result<Vec<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut items = Vec::new();
    loop {
        let page = api.list(&params).await?;
        items.extend(page.items);
        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => params = params.continue_token(&token),
            _ => return Ok(items),
        }
    }
}

fn scope_label(namespace: Option<&str>) -> &str {
    namespace.unwrap_or("all namespaces")
}

fn pod_usage_from_object(metric: &DynamicObject) -> PodUsage {
    let containers = metric.data["containers"]
        .as_array()
        .map(|containers| {
            containers
                .iter()
                .map(|container| {
                    let (cpu_millis, memory_bytes) = parse_usage_from_value(&container["usage"]);
                    ContainerUsage {
                        name: container["name"].as_str().unwrap_or_default().to_string(),
                        cpu_millis,
                        memory_bytes,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodUsage {
        namespace: metric.namespace().unwrap_or_default(),
        name: metric.name_any(),
        containers,
    }
}

fn parse_usage_from_value(value: &Value) -> (u64, u64) {
    let cpu = value
        .get("cpu")
        .and_then(Value::as_str)
        .and_then(parse_cpu_millicores)
        .unwrap_or(0);
    let memory = value
        .get("memory")
        .and_then(Value::as_str)
        .and_then(parse_memory_bytes)
        .unwrap_or(0);
    (cpu, memory)
}

pub fn parse_cpu_millicores(value: &str) -> Option<u64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(number) = raw.strip_suffix('m') {
        (number, 1.0)
    } else if let Some(number) = raw.strip_suffix('u') {
        (number, 0.001)
    } else if let Some(number) = raw.strip_suffix('n') {
        (number, 0.000001)
    } else {
        (raw, 1000.0)
    };

    scale(number, multiplier)
}

pub fn parse_memory_bytes(value: &str) -> Option<u64> {
    const UNITS: [(&str, f64); 13] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
        ("E", 1_000_000_000_000_000_000.0),
        ("P", 1_000_000_000_000_000.0),
        ("T", 1_000_000_000_000.0),
        ("G", 1_000_000_000.0),
        ("M", 1_000_000.0),
        ("k", 1_000.0),
        ("m", 0.001),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    UNITS
        .iter()
        .find_map(|(suffix, multiplier)| {
            raw.strip_suffix(suffix)
                .map(|number| scale(number, *multiplier))
        })
        .unwrap_or_else(|| scale(raw, 1.0))
}

fn scale(number: &str, multiplier: f64) -> Option<u64> {
    let numeric = number.parse::<f64>().ok()?;
    let scaled = (numeric * multiplier).round();
    if !scaled.is_finite() || scaled < 0.0 {
        return None;
    }
    Some(scaled as u64)
}

#[cfg(test)]
mod tests {
    use super::{
        ClusterSource, KubeGateway, parse_cpu_millicores, parse_memory_bytes,
        pod_usage_from_object,
    };
    use http::{Request, Response};
    use kube::client::Body;
    use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
    use kube::{Client, ResourceExt};
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pod_page(name: &str, next: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "apiVersion": "v1",
            "kind": "PodList",
            "metadata": { "continue": next },
            "items": [{
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": { "name": name, "namespace": "prod" },
            }],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn list_pods_follows_continue_tokens() {
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let service = tower::service_fn(move |request: Request<Body>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let query = request.uri().query().unwrap_or_default().to_string();
            async move {
                let body = if query.contains("continue=page2") {
                    pod_page("p2", "")
                } else {
                    pod_page("p1", "page2")
                };
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(200)
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
            }
        });
        let gateway = KubeGateway {
            client: Client::new(service, "default"),
            cluster: "https://fake.cluster:6443".to_string(),
            context: "test".to_string(),
        };

        let pods = gateway.list_pods(None, None).await.unwrap();
        let names = pods.iter().map(ResourceExt::name_any).collect::<Vec<_>>();
        assert_eq!(names, vec!["p1", "p2"]);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cpu_quantities_normalize_to_millicores() {
        assert_eq!(parse_cpu_millicores("150m"), Some(150));
        assert_eq!(parse_cpu_millicores("2"), Some(2000));
        assert_eq!(parse_cpu_millicores("0.5"), Some(500));
        assert_eq!(parse_cpu_millicores("250000000n"), Some(250));
        assert_eq!(parse_cpu_millicores(""), None);
        assert_eq!(parse_cpu_millicores("abc"), None);
    }

    #[test]
    fn memory_quantities_normalize_to_bytes() {
        assert_eq!(parse_memory_bytes("100Mi"), Some(104_857_600));
        assert_eq!(parse_memory_bytes("2Gi"), Some(2_147_483_648));
        assert_eq!(parse_memory_bytes("1k"), Some(1_000));
        assert_eq!(parse_memory_bytes("128974848"), Some(128_974_848));
        assert_eq!(parse_memory_bytes("-1Mi"), None);
    }

    #[test]
    fn pod_metrics_object_yields_per_container_usage() {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let mut object = DynamicObject::new("api-0", &resource).within("prod");
        object.data = json!({
            "containers": [
                {"name": "app", "usage": {"cpu": "100m", "memory": "64Mi"}},
                {"name": "sidecar", "usage": {"cpu": "50m", "memory": "36Mi"}}
            ]
        });

        let usage = pod_usage_from_object(&object);
        assert_eq!(usage.namespace, "prod");
        assert_eq!(usage.name, "api-0");
        assert_eq!(usage.total_cpu(), 150);
        assert_eq!(usage.total_memory(), 104_857_600);
        assert_eq!(usage.container("sidecar").map(|c| c.cpu_millis), Some(50));
    }
}
