use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use k8s_openapi::api::core::v1::{ContainerState, ContainerStatus, Event, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::jiff::Timestamp;
use std::collections::{BTreeMap, HashMap};

use crate::k8s::{ClusterSource, parse_cpu_millicores, parse_memory_bytes};
use crate::model::{
    ContainerDetail, Controller, EventRow, Filter, NodeRow, NodeUsage, PodDetail, PodEvent,
    PodRow, PodUsage, SortKey, StatusRank,
};

pub const DEFAULT_LOG_TAIL_LINES: i64 = 100;

/// Turns raw cluster records into sorted, filtered display rows.
pub struct Aggregator<'a, C> {
    source: &'a C,
    log_tail_lines: i64,
}

impl<'a, C: ClusterSource> Aggregator<'a, C> {
    pub fn new(source: &'a C) -> Self {
        Self {
            source,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }

    pub fn with_log_tail(mut self, lines: i64) -> Self {
        self.log_tail_lines = lines.max(1);
        self
    }

    /// One row per node present in the metrics snapshot.
    pub async fn nodes(&self, sort: SortKey) -> Result<Vec<NodeRow>> {
        let (usage, pods) = tokio::try_join!(
            self.source.node_metrics(),
            self.source.list_pods(None, None)
        )?;

        let specs = try_join_all(usage.iter().map(|sample| async move {
            self.source
                .get_node(&sample.name)
                .await
                .with_context(|| format!("node {} has metrics but no node record", sample.name))
        }))
        .await?;

        let mut pod_counts = HashMap::<&str, usize>::new();
        for node_name in pods
            .iter()
            .filter_map(|pod| pod.spec.as_ref()?.node_name.as_deref())
        {
            *pod_counts.entry(node_name).or_default() += 1;
        }

        let mut rows = usage
            .iter()
            .zip(specs.iter())
            .map(|(sample, node)| {
                let pods = pod_counts.get(sample.name.as_str()).copied().unwrap_or(0);
                build_node_row(sample, node, pods)
            })
            .collect::<Vec<_>>();
        sort_nodes(&mut rows, sort);
        Ok(rows)
    }

    pub async fn pods(&self, filter: &Filter, sort: SortKey) -> Result<Vec<PodRow>> {
        let namespace = filter.namespace.as_deref();
        let (pods, usage) = tokio::try_join!(
            self.source.list_pods(namespace, filter.node.as_deref()),
            self.source.pod_metrics(namespace)
        )?;

        let usage_by_pod = usage
            .iter()
            .map(|sample| ((sample.namespace.as_str(), sample.name.as_str()), sample))
            .collect::<HashMap<_, _>>();

        let mut rows = pods
            .iter()
            .map(|pod| {
                let key = (
                    pod.metadata.namespace.as_deref().unwrap_or_default(),
                    pod.metadata.name.as_deref().unwrap_or_default(),
                );
                build_pod_row(pod, usage_by_pod.get(&key).copied())
            })
            .filter(|row| filter.matches_pod(row))
            .collect::<Vec<_>>();
        sort_pods(&mut rows, sort);
        Ok(rows)
    }

    /// Events are narrowed by namespace and type only; node identity on events
    /// is not reliable enough to filter on.
    pub async fn events(&self, filter: &Filter, sort: SortKey) -> Result<Vec<EventRow>> {
        let events = self
            .source
            .list_events(filter.namespace.as_deref(), None)
            .await?;

        let mut rows = events
            .iter()
            .map(build_event_row)
            .filter(|row| filter.matches_event(row))
            .collect::<Vec<_>>();
        sort_events(&mut rows, sort);
        Ok(rows)
    }

    pub async fn pod_detail(
        &self,
        namespace: &str,
        name: &str,
        container_index: usize,
    ) -> Result<PodDetail> {
        let pod = self.source.get_pod(namespace, name).await?;
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default();
        let selected = if container_index < containers.len() {
            container_index
        } else {
            0
        };

        let logs = async {
            match containers.get(selected) {
                Some(container) => {
                    self.source
                        .pod_logs(namespace, name, &container.name, self.log_tail_lines)
                        .await
                }
                None => Ok(String::new()),
            }
        };
        let (events, usage, logs) = tokio::try_join!(
            self.source.list_events(Some(namespace), Some(name)),
            self.source.pod_metrics_for(namespace, name),
            logs
        )?;

        Ok(build_pod_detail(&pod, &events, &usage, selected, &logs))
    }

    pub async fn event_detail(&self, namespace: &str, name: &str) -> Result<EventRow> {
        let event = self.source.get_event(namespace, name).await?;
        Ok(build_event_row(&event))
    }

    /// Choices for the node filter list.
    pub async fn node_names(&self) -> Result<Vec<String>> {
        let nodes = self.source.list_nodes().await?;
        let mut names = nodes
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub async fn namespaces(&self) -> Result<Vec<String>> {
        self.source.list_namespaces().await
    }
}

fn to_utc(timestamp: &Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.as_second(), 0)
}

fn quantity(
    map: Option<&BTreeMap<String, Quantity>>,
    key: &str,
    parse: fn(&str) -> Option<u64>,
) -> u64 {
    map.and_then(|map| map.get(key))
        .and_then(|quantity| parse(&quantity.0))
        .unwrap_or(0)
}

fn build_node_row(usage: &NodeUsage, node: &Node, pods: usize) -> NodeRow {
    let status = node.status.as_ref();
    let allocatable = status.and_then(|status| status.allocatable.as_ref());
    let address = |kind: &str| {
        status
            .and_then(|status| status.addresses.as_ref())
            .and_then(|addresses| addresses.iter().find(|address| address.type_ == kind))
            .map(|address| address.address.clone())
            .unwrap_or_default()
    };

    NodeRow {
        name: usage.name.clone(),
        pods,
        cpu_used: usage.cpu_millis,
        cpu_total: quantity(allocatable, "cpu", parse_cpu_millicores),
        memory_used: usage.memory_bytes,
        memory_total: quantity(allocatable, "memory", parse_memory_bytes),
        external_ip: address("ExternalIP"),
        internal_ip: address("InternalIP"),
    }
}

/// Waiting or terminated state of one container, if it is in either.
fn unhealthy_state(state: &ContainerState) -> Option<(String, StatusRank)> {
    let reason = |reason: Option<&String>, fallback: StatusRank| {
        reason
            .filter(|reason| !reason.is_empty())
            .cloned()
            .unwrap_or_else(|| fallback.label().to_string())
    };

    if let Some(waiting) = &state.waiting {
        Some((
            reason(waiting.reason.as_ref(), StatusRank::Waiting),
            StatusRank::Waiting,
        ))
    } else {
        state.terminated.as_ref().map(|terminated| {
            (
                reason(terminated.reason.as_ref(), StatusRank::Terminated),
                StatusRank::Terminated,
            )
        })
    }
}

/// First waiting or terminated container decides; otherwise the pod is running.
pub fn derive_status(statuses: &[ContainerStatus]) -> (String, StatusRank) {
    statuses
        .iter()
        .find_map(|status| status.state.as_ref().and_then(unhealthy_state))
        .unwrap_or_else(|| (StatusRank::Running.label().to_string(), StatusRank::Running))
}

fn build_pod_row(pod: &Pod, usage: Option<&PodUsage>) -> PodRow {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();
    let statuses = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or_default();

    let mut cpu_limit = 0u64;
    let mut cpu_limit_count = 0usize;
    let mut memory_limit = 0u64;
    let mut memory_limit_count = 0usize;
    for container in containers {
        let limits = container
            .resources
            .as_ref()
            .and_then(|resources| resources.limits.as_ref());
        let cpu = quantity(limits, "cpu", parse_cpu_millicores);
        let memory = quantity(limits, "memory", parse_memory_bytes);
        if cpu > 0 {
            cpu_limit = cpu_limit.saturating_add(cpu);
            cpu_limit_count += 1;
        }
        if memory > 0 {
            memory_limit = memory_limit.saturating_add(memory);
            memory_limit_count += 1;
        }
    }

    let (status, status_rank) = derive_status(statuses);

    PodRow {
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        name: pod.metadata.name.clone().unwrap_or_default(),
        node: pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .unwrap_or_default(),
        cpu_used: usage.map(PodUsage::total_cpu).unwrap_or(0),
        memory_used: usage.map(PodUsage::total_memory).unwrap_or(0),
        cpu_limit,
        cpu_limit_count,
        memory_limit,
        memory_limit_count,
        containers: containers.len(),
        ready: statuses.iter().filter(|status| status.ready).count(),
        status,
        status_rank,
        restarts: statuses
            .iter()
            .map(|status| i64::from(status.restart_count))
            .sum(),
        created: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(&time.0)),
        ip: pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.clone())
            .unwrap_or_default(),
    }
}

fn event_last_seen(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|time| &time.0)
        .or_else(|| event.event_time.as_ref().map(|time| &time.0))
        .or_else(|| event.first_timestamp.as_ref().map(|time| &time.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|time| &time.0))
        .and_then(to_utc)
}

fn build_event_row(event: &Event) -> EventRow {
    let source = event.source.as_ref();
    EventRow {
        uid: event.metadata.uid.clone().unwrap_or_default(),
        namespace: event
            .metadata
            .namespace
            .clone()
            .or_else(|| event.involved_object.namespace.clone())
            .unwrap_or_default(),
        name: event.metadata.name.clone().unwrap_or_default(),
        kind: event.involved_object.kind.clone().unwrap_or_default(),
        event_type: event.type_.clone().unwrap_or_default(),
        reason: event.reason.clone().unwrap_or_default(),
        source: source
            .and_then(|source| source.component.clone())
            .or_else(|| event.reporting_component.clone())
            .unwrap_or_default(),
        node: source
            .and_then(|source| source.host.clone())
            .or_else(|| event.reporting_instance.clone())
            .unwrap_or_default(),
        message: event.message.clone().unwrap_or_default(),
        first_seen: event
            .first_timestamp
            .as_ref()
            .and_then(|time| to_utc(&time.0)),
        last_seen: event_last_seen(event),
        count: event.count.unwrap_or(1),
    }
}

fn build_pod_detail(
    pod: &Pod,
    events: &[Event],
    usage: &PodUsage,
    selected_container: usize,
    logs: &str,
) -> PodDetail {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or_default();

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|container| {
            let status = statuses.iter().find(|status| status.name == container.name);
            let used = usage.container(&container.name);
            let resources = container.resources.as_ref();
            let requests = resources.and_then(|resources| resources.requests.as_ref());
            let limits = resources.and_then(|resources| resources.limits.as_ref());
            ContainerDetail {
                name: container.name.clone(),
                restarts: status.map(|status| status.restart_count).unwrap_or(0),
                status: status
                    .map(|status| derive_status(std::slice::from_ref(status)).0)
                    .unwrap_or_else(|| "-".to_string()),
                cpu_used: used.map(|used| used.cpu_millis).unwrap_or(0),
                cpu_request: quantity(requests, "cpu", parse_cpu_millicores),
                cpu_limit: quantity(limits, "cpu", parse_cpu_millicores),
                memory_used: used.map(|used| used.memory_bytes).unwrap_or(0),
                memory_request: quantity(requests, "memory", parse_memory_bytes),
                memory_limit: quantity(limits, "memory", parse_memory_bytes),
            }
        })
        .collect();

    let mut recent = events
        .iter()
        .map(|event| PodEvent {
            last_seen: event_last_seen(event),
            message: event.message.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>();
    recent.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

    PodDetail {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        node: pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .unwrap_or_default(),
        status: derive_status(statuses).0,
        ip: pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.clone())
            .unwrap_or_default(),
        created: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(&time.0)),
        controllers: pod
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|owner| Controller {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            })
            .collect(),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
        events: recent,
        containers,
        selected_container,
        log_lines: newest_first(logs),
    }
}

/// Reverses log output so the latest line comes first. The trailing newline
/// of the raw output would otherwise become an empty first line.
fn newest_first(logs: &str) -> Vec<String> {
    let mut lines = logs.split('\n').rev().map(str::to_string).collect::<Vec<_>>();
    if lines.first().is_some_and(String::is_empty) {
        lines.remove(0);
    }
    lines
}

pub fn sort_nodes(rows: &mut [NodeRow], sort: SortKey) {
    match sort {
        SortKey::CpuAsc => rows.sort_by_key(|row| row.cpu_used),
        SortKey::CpuDesc => rows.sort_by(|a, b| b.cpu_used.cmp(&a.cpu_used)),
        SortKey::MemoryAsc => rows.sort_by_key(|row| row.memory_used),
        SortKey::MemoryDesc => rows.sort_by(|a, b| b.memory_used.cmp(&a.memory_used)),
        SortKey::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::PodsAsc => rows.sort_by_key(|row| row.pods),
        SortKey::PodsDesc => rows.sort_by(|a, b| b.pods.cmp(&a.pods)),
        other => unreachable!("{other} is not a node sort order"),
    }
}

pub fn sort_pods(rows: &mut [PodRow], sort: SortKey) {
    match sort {
        SortKey::CpuAsc => rows.sort_by_key(|row| row.cpu_used),
        SortKey::CpuDesc => rows.sort_by(|a, b| b.cpu_used.cmp(&a.cpu_used)),
        SortKey::MemoryAsc => rows.sort_by_key(|row| row.memory_used),
        SortKey::MemoryDesc => rows.sort_by(|a, b| b.memory_used.cmp(&a.memory_used)),
        SortKey::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Namespace => rows.sort_by(|a, b| a.namespace.cmp(&b.namespace)),
        SortKey::RestartsAsc => rows.sort_by_key(|row| row.restarts),
        SortKey::RestartsDesc => rows.sort_by(|a, b| b.restarts.cmp(&a.restarts)),
        SortKey::Status => rows.sort_by_key(|row| row.status_rank),
        other => unreachable!("{other} is not a pod sort order"),
    }
}

pub fn sort_events(rows: &mut [EventRow], sort: SortKey) {
    match sort {
        SortKey::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Namespace => rows.sort_by(|a, b| a.namespace.cmp(&b.namespace)),
        SortKey::TimeAsc => rows.sort_by_key(|row| row.last_seen),
        SortKey::TimeDesc => rows.sort_by(|a, b| b.last_seen.cmp(&a.last_seen)),
        other => unreachable!("{other} is not an event sort order"),
    }
}
