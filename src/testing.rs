//! In-memory cluster and record builders shared by unit tests.

use anyhow::{Result, anyhow, bail};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus, Event, EventSource, Node, NodeAddress, NodeStatus,
    ObjectReference, Pod, PodSpec, PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use k8s_openapi::jiff::Timestamp;
use std::collections::{BTreeMap, HashMap};

use crate::k8s::ClusterSource;
use crate::model::{ContainerUsage, NodeUsage, PodUsage};

#[derive(Default)]
pub struct FakeCluster {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub node_usage: Vec<NodeUsage>,
    pub pod_usage: Vec<PodUsage>,
    pub events: Vec<Event>,
    pub namespaces: Vec<String>,
    /// Keyed by `namespace/pod/container`.
    pub logs: HashMap<String, String>,
    /// Name of a trait method that should fail.
    pub failing: Option<&'static str>,
}

impl FakeCluster {
    fn check(&self, call: &'static str) -> Result<()> {
        if self.failing == Some(call) {
            bail!("{call} unavailable");
        }
        Ok(())
    }
}

impl ClusterSource for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check("list_nodes")?;
        Ok(self.nodes.clone())
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        self.check("get_node")?;
        self.nodes
            .iter()
            .find(|node| node.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| anyhow!("node {name} not found"))
    }

    async fn list_pods(&self, namespace: Option<&str>, node: Option<&str>) -> Result<Vec<Pod>> {
        self.check("list_pods")?;
        Ok(self
            .pods
            .iter()
            .filter(|pod| namespace.is_none_or(|ns| pod.metadata.namespace.as_deref() == Some(ns)))
            .filter(|pod| {
                node.is_none_or(|node| {
                    pod.spec
                        .as_ref()
                        .and_then(|spec| spec.node_name.as_deref())
                        == Some(node)
                })
            })
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.check("get_pod")?;
        self.pods
            .iter()
            .find(|pod| {
                pod.metadata.namespace.as_deref() == Some(namespace)
                    && pod.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| anyhow!("pod {namespace}/{name} not found"))
    }

    async fn node_metrics(&self) -> Result<Vec<NodeUsage>> {
        self.check("node_metrics")?;
        Ok(self.node_usage.clone())
    }

    async fn pod_metrics(&self, namespace: Option<&str>) -> Result<Vec<PodUsage>> {
        self.check("pod_metrics")?;
        Ok(self
            .pod_usage
            .iter()
            .filter(|usage| namespace.is_none_or(|ns| usage.namespace == ns))
            .cloned()
            .collect())
    }

    async fn pod_metrics_for(&self, namespace: &str, name: &str) -> Result<PodUsage> {
        self.check("pod_metrics_for")?;
        self.pod_usage
            .iter()
            .find(|usage| usage.namespace == namespace && usage.name == name)
            .cloned()
            .ok_or_else(|| anyhow!("metrics for {namespace}/{name} not found"))
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_object: Option<&str>,
    ) -> Result<Vec<Event>> {
        self.check("list_events")?;
        Ok(self
            .events
            .iter()
            .filter(|event| {
                namespace.is_none_or(|ns| event.metadata.namespace.as_deref() == Some(ns))
            })
            .filter(|event| {
                involved_object
                    .is_none_or(|name| event.involved_object.name.as_deref() == Some(name))
            })
            .cloned()
            .collect())
    }

    async fn get_event(&self, namespace: &str, name: &str) -> Result<Event> {
        self.check("get_event")?;
        self.events
            .iter()
            .find(|event| {
                event.metadata.namespace.as_deref() == Some(namespace)
                    && event.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| anyhow!("event {namespace}/{name} not found"))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        _tail_lines: i64,
    ) -> Result<String> {
        self.check("pod_logs")?;
        Ok(self
            .logs
            .get(&format!("{namespace}/{pod}/{container}"))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        self.check("list_namespaces")?;
        Ok(self.namespaces.clone())
    }

    fn cluster_identity(&self) -> &str {
        "https://fake.cluster:6443"
    }
}

pub fn time(seconds: i64) -> Time {
    Time(Timestamp::from_second(seconds).expect("valid timestamp"))
}

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    let mut map = BTreeMap::new();
    if !cpu.is_empty() {
        map.insert("cpu".to_string(), Quantity(cpu.to_string()));
    }
    if !memory.is_empty() {
        map.insert("memory".to_string(), Quantity(memory.to_string()));
    }
    map
}

pub fn node(name: &str, cpu: &str, memory: &str, internal_ip: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(NodeStatus {
            allocatable: Some(quantities(cpu, memory)),
            addresses: Some(vec![NodeAddress {
                address: internal_ip.to_string(),
                type_: "InternalIP".to_string(),
            }]),
            ..NodeStatus::default()
        }),
        ..Node::default()
    }
}

pub fn pod(namespace: &str, name: &str, node: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            creation_timestamp: Some(time(1_700_000_000)),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            ..PodSpec::default()
        }),
        status: Some(PodStatus {
            pod_ip: Some("10.0.0.1".to_string()),
            ..PodStatus::default()
        }),
    }
}

/// Adds a container with optional `cpu`/`memory` limits (empty string = unset).
pub fn with_container(mut pod: Pod, name: &str, cpu_limit: &str, memory_limit: &str) -> Pod {
    let limits = quantities(cpu_limit, memory_limit);
    let container = Container {
        name: name.to_string(),
        resources: Some(ResourceRequirements {
            limits: (!limits.is_empty()).then_some(limits),
            ..ResourceRequirements::default()
        }),
        ..Container::default()
    };
    if let Some(spec) = pod.spec.as_mut() {
        spec.containers.push(container);
    }
    pod
}

pub enum State {
    Running,
    Waiting(&'static str),
    Terminated(&'static str),
}

pub fn with_status(mut pod: Pod, name: &str, state: State, restarts: i32, ready: bool) -> Pod {
    let state = match state {
        State::Running => ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..ContainerState::default()
        },
        State::Waiting(reason) => ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some(reason.to_string()),
                ..ContainerStateWaiting::default()
            }),
            ..ContainerState::default()
        },
        State::Terminated(reason) => ContainerState {
            terminated: Some(ContainerStateTerminated {
                reason: Some(reason.to_string()),
                ..ContainerStateTerminated::default()
            }),
            ..ContainerState::default()
        },
    };
    let status = ContainerStatus {
        name: name.to_string(),
        ready,
        restart_count: restarts,
        state: Some(state),
        ..ContainerStatus::default()
    };
    if let Some(pod_status) = pod.status.as_mut() {
        pod_status
            .container_statuses
            .get_or_insert_with(Vec::new)
            .push(status);
    }
    pod
}

pub fn with_owner(mut pod: Pod, kind: &str, name: &str) -> Pod {
    pod.metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(OwnerReference {
            kind: kind.to_string(),
            name: name.to_string(),
            ..OwnerReference::default()
        });
    pod
}

pub fn usage(namespace: &str, name: &str, containers: &[(&str, u64, u64)]) -> PodUsage {
    PodUsage {
        namespace: namespace.to_string(),
        name: name.to_string(),
        containers: containers
            .iter()
            .map(|(container, cpu, memory)| ContainerUsage {
                name: container.to_string(),
                cpu_millis: *cpu,
                memory_bytes: *memory,
            })
            .collect(),
    }
}

pub fn event(namespace: &str, name: &str, object: &str, event_type: &str, last_seen: i64) -> Event {
    Event {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            uid: Some(format!("uid-{name}")),
            ..ObjectMeta::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some(object.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectReference::default()
        },
        type_: Some(event_type.to_string()),
        reason: Some("Scheduled".to_string()),
        message: Some(format!("{name} happened")),
        source: Some(EventSource {
            component: Some("kubelet".to_string()),
            host: Some("node-a".to_string()),
        }),
        count: Some(1),
        first_timestamp: Some(time(last_seen - 60)),
        last_timestamp: Some(time(last_seen)),
        ..Event::default()
    }
}
