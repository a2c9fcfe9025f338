use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ViewKind {
    Nodes,
    Pods,
    PodDetails,
    Events,
    EventDetails,
}

impl ViewKind {
    /// Views reachable from the view-switch overlay, in display order.
    pub const SWITCHABLE: [Self; 3] = [Self::Pods, Self::Nodes, Self::Events];

    pub fn title(self) -> &'static str {
        match self {
            Self::Nodes => "Nodes",
            Self::Pods => "Pods",
            Self::PodDetails => "Pod Details",
            Self::Events => "Events",
            Self::EventDetails => "Event Details",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "nodes" | "node" | "no" => Some(Self::Nodes),
            "pods" | "pod" | "po" => Some(Self::Pods),
            "events" | "event" | "ev" => Some(Self::Events),
            _ => None,
        }
    }

    pub fn default_sort(self) -> SortKey {
        match self {
            Self::Nodes => SortKey::Name,
            Self::Pods | Self::PodDetails => SortKey::Namespace,
            Self::Events | Self::EventDetails => SortKey::TimeDesc,
        }
    }

    /// The closed set of sort keys a view accepts. Detail views accept none.
    pub fn sort_keys(self) -> &'static [SortKey] {
        match self {
            Self::Nodes => &SortKey::NODES,
            Self::Pods => &SortKey::PODS,
            Self::Events => &SortKey::EVENTS,
            Self::PodDetails | Self::EventDetails => &[],
        }
    }

    pub fn is_detail(self) -> bool {
        matches!(self, Self::PodDetails | Self::EventDetails)
    }
}

impl Display for ViewKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SortKey {
    CpuAsc,
    CpuDesc,
    MemoryAsc,
    MemoryDesc,
    Name,
    Namespace,
    PodsAsc,
    PodsDesc,
    RestartsAsc,
    RestartsDesc,
    Status,
    TimeAsc,
    TimeDesc,
}

impl SortKey {
    pub const NODES: [Self; 7] = [
        Self::CpuAsc,
        Self::CpuDesc,
        Self::MemoryAsc,
        Self::MemoryDesc,
        Self::Name,
        Self::PodsAsc,
        Self::PodsDesc,
    ];

    pub const PODS: [Self; 9] = [
        Self::CpuAsc,
        Self::CpuDesc,
        Self::MemoryAsc,
        Self::MemoryDesc,
        Self::Name,
        Self::Namespace,
        Self::RestartsAsc,
        Self::RestartsDesc,
        Self::Status,
    ];

    pub const EVENTS: [Self; 4] = [Self::Name, Self::Namespace, Self::TimeAsc, Self::TimeDesc];

    pub const ALL: [Self; 13] = [
        Self::CpuAsc,
        Self::CpuDesc,
        Self::MemoryAsc,
        Self::MemoryDesc,
        Self::Name,
        Self::Namespace,
        Self::PodsAsc,
        Self::PodsDesc,
        Self::RestartsAsc,
        Self::RestartsDesc,
        Self::Status,
        Self::TimeAsc,
        Self::TimeDesc,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CpuAsc => "CPU (A)",
            Self::CpuDesc => "CPU (D)",
            Self::MemoryAsc => "Memory (A)",
            Self::MemoryDesc => "Memory (D)",
            Self::Name => "Name",
            Self::Namespace => "Namespace",
            Self::PodsAsc => "Pods (A)",
            Self::PodsDesc => "Pods (D)",
            Self::RestartsAsc => "Restarts (A)",
            Self::RestartsDesc => "Restarts (D)",
            Self::Status => "Status",
            Self::TimeAsc => "Timestamp (A)",
            Self::TimeDesc => "Timestamp (D)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.label().eq_ignore_ascii_case(wanted))
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered health category. Derived order is the sort order: terminated first.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StatusRank {
    Terminated,
    Waiting,
    Running,
}

impl StatusRank {
    pub fn label(self) -> &'static str {
        match self {
            Self::Terminated => "Terminated",
            Self::Waiting => "Waiting",
            Self::Running => "Running",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }

    pub fn matches(self, raw: &str) -> bool {
        raw.eq_ignore_ascii_case(self.label())
    }
}

/// Request-scoped narrowing. `None` everywhere means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub status: Option<StatusRank>,
    pub event_type: Option<EventType>,
}

impl Filter {
    pub fn with_namespace(namespace: Option<String>) -> Self {
        Self {
            namespace: namespace.filter(|value| !value.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn matches_pod(&self, row: &PodRow) -> bool {
        self.namespace
            .as_deref()
            .is_none_or(|namespace| namespace == row.namespace)
            && self
                .node
                .as_deref()
                .is_none_or(|node| node == row.node)
            && self.status.is_none_or(|rank| rank == row.status_rank)
    }

    pub fn matches_event(&self, row: &EventRow) -> bool {
        self.namespace
            .as_deref()
            .is_none_or(|namespace| namespace == row.namespace)
            && self
                .event_type
                .is_none_or(|event_type| event_type.matches(&row.event_type))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRow {
    pub name: String,
    pub pods: usize,
    pub cpu_used: u64,
    pub cpu_total: u64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub external_ip: String,
    pub internal_ip: String,
}

impl NodeRow {
    pub fn cpu_percent(&self) -> Option<f64> {
        usage_percent(self.cpu_used, self.cpu_total)
    }

    pub fn memory_percent(&self) -> Option<f64> {
        usage_percent(self.memory_used, self.memory_total)
    }
}

fn usage_percent(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 * 100.0 / total as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodRow {
    pub namespace: String,
    pub name: String,
    pub node: String,
    pub cpu_used: u64,
    pub memory_used: u64,
    pub cpu_limit: u64,
    pub cpu_limit_count: usize,
    pub memory_limit: u64,
    pub memory_limit_count: usize,
    pub containers: usize,
    pub ready: usize,
    pub status: String,
    pub status_rank: StatusRank,
    pub restarts: i64,
    pub created: Option<DateTime<Utc>>,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDetail {
    pub name: String,
    pub restarts: i32,
    pub status: String,
    pub cpu_used: u64,
    pub cpu_request: u64,
    pub cpu_limit: u64,
    pub memory_used: u64,
    pub memory_request: u64,
    pub memory_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub kind: String,
    pub name: String,
}

impl Display for Controller {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodEvent {
    pub last_seen: Option<DateTime<Utc>>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub node: String,
    pub status: String,
    pub ip: String,
    pub created: Option<DateTime<Utc>>,
    pub controllers: Vec<Controller>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Newest first.
    pub events: Vec<PodEvent>,
    pub containers: Vec<ContainerDetail>,
    pub selected_container: usize,
    /// Newest first.
    pub log_lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRow {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub event_type: String,
    pub reason: String,
    pub source: String,
    pub node: String,
    pub message: String,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub count: i32,
}

/// Usage sample for one node from the metrics API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

/// Usage sample for one pod from the metrics API, per container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsage {
    pub fn total_cpu(&self) -> u64 {
        self.containers
            .iter()
            .fold(0u64, |acc, container| acc.saturating_add(container.cpu_millis))
    }

    pub fn total_memory(&self) -> u64 {
        self.containers
            .iter()
            .fold(0u64, |acc, container| acc.saturating_add(container.memory_bytes))
    }

    pub fn container(&self, name: &str) -> Option<&ContainerUsage> {
        self.containers.iter().find(|container| container.name == name)
    }
}
