use anyhow::Result;
use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::Rect;
use tracing::debug;

use crate::aggregate::Aggregator;
use crate::detail::{EventDetailsPane, PodDetailsPane};
use crate::format::{
    format_age, format_bytes, format_cpu, format_percent, render_cpu_limit, render_memory_limit,
};
use crate::k8s::ClusterSource;
use crate::model::{EventRow, Filter, NodeRow, PodRow, SortKey, ViewKind};
use crate::table::{Column, Motion, Row, ScrollTable};

pub const NODE_NAME_COLUMN: usize = 0;
pub const POD_NAMESPACE_COLUMN: usize = 0;
pub const POD_NAME_COLUMN: usize = 1;
pub const EVENT_NAMESPACE_COLUMN: usize = 4;
pub const EVENT_NAME_COLUMN: usize = 5;

fn node_columns() -> Vec<Column> {
    vec![
        Column::elastic("NAME", 160, 40),
        Column::fixed("PODS", 20),
        Column::fixed("CPU", 20),
        Column::fixed("MEMORY", 20),
        Column::fixed("MEMORY MAX", 20),
        Column::fixed("EXTERNAL IP", 40),
        Column::fixed("INTERNAL IP", 40),
    ]
}

fn node_cells(row: &NodeRow) -> Row {
    vec![
        row.name.clone(),
        row.pods.to_string(),
        format_percent(row.cpu_percent()),
        format_percent(row.memory_percent()),
        format_bytes(row.memory_total),
        row.external_ip.clone(),
        row.internal_ip.clone(),
    ]
}

fn pod_columns() -> Vec<Column> {
    vec![
        Column::fixed("NAMESPACE", 20),
        Column::elastic("POD", 150, 40),
        Column::fixed("READY", 10),
        Column::fixed("STATUS", 20),
        Column::fixed("RESTARTS", 10),
        Column::fixed("CPU", 15),
        Column::fixed("CPU MAX", 15),
        Column::fixed("MEMORY", 15),
        Column::fixed("MEMORY MAX", 15),
        Column::fixed("IP", 20),
        Column::fixed("AGE", 10),
        Column::hidden("ID"),
    ]
}

const POD_ID_COLUMN: usize = 11;

fn pod_cells(row: &PodRow, now: DateTime<Utc>) -> Row {
    vec![
        row.namespace.clone(),
        row.name.clone(),
        format!("{}/{}", row.ready, row.containers),
        row.status.clone(),
        row.restarts.to_string(),
        format_cpu(row.cpu_used),
        render_cpu_limit(row.cpu_limit, row.cpu_limit_count, row.containers),
        format_bytes(row.memory_used),
        render_memory_limit(row.memory_limit, row.memory_limit_count, row.containers),
        row.ip.clone(),
        format_age(row.created, now),
        format!("{}/{}", row.namespace, row.name),
    ]
}

fn event_columns() -> Vec<Column> {
    vec![
        Column::hidden("UID"),
        Column::fixed("AGE", 10),
        Column::fixed("COUNT", 10),
        Column::fixed("TYPE", 10),
        Column::fixed("NAMESPACE", 20),
        Column::fixed("NAME", 50),
        Column::elastic("MESSAGE", 100, 80),
        Column::hidden("KIND"),
        Column::hidden("REASON"),
        Column::hidden("SOURCE"),
        Column::hidden("NODE"),
    ]
}

fn event_cells(row: &EventRow, now: DateTime<Utc>) -> Row {
    vec![
        row.uid.clone(),
        format_age(row.last_seen, now),
        row.count.to_string(),
        row.event_type.clone(),
        row.namespace.clone(),
        row.name.clone(),
        row.message.clone(),
        row.kind.clone(),
        row.reason.clone(),
        row.source.clone(),
        row.node.clone(),
    ]
}

#[derive(Debug, Clone)]
enum Body {
    Nodes(ScrollTable),
    Pods(ScrollTable),
    Events(ScrollTable),
    PodDetails(PodDetailsPane),
    EventDetails(EventDetailsPane),
}

/// One refreshable, navigable screen. Detail views keep their parent's
/// filter and sort so leaving them restores the list as it was.
#[derive(Debug, Clone)]
pub struct View {
    kind: ViewKind,
    filter: Filter,
    sort: SortKey,
    paused: bool,
    body: Body,
}

impl View {
    /// A list view of `kind` with its default sort.
    #[cfg(test)]
    pub fn list(kind: ViewKind, filter: Filter) -> Self {
        Self::list_sorted(kind, filter, kind.default_sort())
    }

    pub fn list_sorted(kind: ViewKind, filter: Filter, sort: SortKey) -> Self {
        let (kind, body) = match kind {
            ViewKind::Nodes => (
                ViewKind::Nodes,
                Body::Nodes(ScrollTable::new(node_columns(), NODE_NAME_COLUMN)),
            ),
            ViewKind::Events | ViewKind::EventDetails => (
                ViewKind::Events,
                Body::Events(ScrollTable::new(event_columns(), 0)),
            ),
            ViewKind::Pods | ViewKind::PodDetails => (
                ViewKind::Pods,
                Body::Pods(ScrollTable::new(pod_columns(), POD_ID_COLUMN)),
            ),
        };
        let sort = if kind.sort_keys().contains(&sort) {
            sort
        } else {
            kind.default_sort()
        };
        Self {
            kind,
            filter,
            sort,
            paused: false,
            body,
        }
    }

    pub fn pod_details(namespace: String, name: String, filter: Filter, sort: SortKey) -> Self {
        Self {
            kind: ViewKind::PodDetails,
            filter,
            sort,
            paused: false,
            body: Body::PodDetails(PodDetailsPane::new(namespace, name)),
        }
    }

    pub fn event_details(namespace: String, name: String, filter: Filter, sort: SortKey) -> Self {
        Self {
            kind: ViewKind::EventDetails,
            filter,
            sort,
            paused: false,
            body: Body::EventDetails(EventDetailsPane::new(namespace, name)),
        }
    }

    /// The list view a detail view was entered from.
    pub fn parent(&self) -> Option<Self> {
        self.kind
            .is_detail()
            .then(|| Self::list_sorted(self.kind, self.filter.clone(), self.sort))
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sort_order(&self) -> SortKey {
        self.sort
    }

    /// Applies a new sort and filter. Sort keys outside this view's set are
    /// ignored; detail views keep their parent's sort untouched.
    pub fn set_sort_and_filter(&mut self, sort: SortKey, filter: Filter) {
        if self.kind.sort_keys().contains(&sort) {
            self.sort = sort;
        } else if sort != self.sort {
            debug!("ignoring sort {sort} for {} view", self.kind);
        }
        self.filter = filter;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freezes the view's data; navigation keeps working.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.paused = false;
        } else {
            self.pause();
        }
    }

    /// Re-runs this view's query. A paused view keeps its current data.
    pub async fn update<C: ClusterSource>(
        &mut self,
        aggregator: &Aggregator<'_, C>,
    ) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let now = Utc::now();
        match &mut self.body {
            Body::Nodes(table) => {
                let rows = aggregator.nodes(self.sort).await?;
                table.set_rows(rows.iter().map(node_cells).collect());
            }
            Body::Pods(table) => {
                let rows = aggregator.pods(&self.filter, self.sort).await?;
                table.set_rows(rows.iter().map(|row| pod_cells(row, now)).collect());
            }
            Body::Events(table) => {
                let rows = aggregator.events(&self.filter, self.sort).await?;
                table.set_rows(rows.iter().map(|row| event_cells(row, now)).collect());
            }
            Body::PodDetails(pane) => pane.update(aggregator).await?,
            Body::EventDetails(pane) => pane.update(aggregator).await?,
        }
        Ok(())
    }

    /// Raw fields of the row under the cursor; empty for detail views.
    pub fn selected_values(&self) -> Vec<String> {
        match &self.body {
            Body::Nodes(table) | Body::Pods(table) | Body::Events(table) => {
                table.selected_values()
            }
            Body::PodDetails(_) | Body::EventDetails(_) => Vec::new(),
        }
    }

    pub fn navigate(&mut self, motion: Motion) {
        match &mut self.body {
            Body::Nodes(table) | Body::Pods(table) | Body::Events(table) => {
                table.navigate(motion)
            }
            Body::PodDetails(pane) => pane.navigate(motion),
            Body::EventDetails(pane) => pane.navigate(motion),
        }
    }

    /// Selects the next container of a pod detail view. Returns whether the
    /// view needs a refresh to follow the selection. A paused view keeps its
    /// container so the cursor never disagrees with the frozen logs.
    pub fn tab_next(&mut self) -> bool {
        if self.paused {
            debug!("container switch ignored while paused");
            return false;
        }
        match &mut self.body {
            Body::PodDetails(pane) => pane.tab_next(),
            _ => false,
        }
    }

    pub fn tab_prev(&mut self) -> bool {
        if self.paused {
            debug!("container switch ignored while paused");
            return false;
        }
        match &mut self.body {
            Body::PodDetails(pane) => pane.tab_prev(),
            _ => false,
        }
    }

    pub fn resize(&mut self, area: Rect) {
        match &mut self.body {
            Body::Nodes(table) | Body::Pods(table) | Body::Events(table) => table.set_area(area),
            Body::PodDetails(pane) => pane.resize(area),
            Body::EventDetails(pane) => pane.resize(area),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        match &self.body {
            Body::Nodes(table) | Body::Pods(table) | Body::Events(table) => {
                frame.render_widget(table, area)
            }
            Body::PodDetails(pane) => pane.render(frame),
            Body::EventDetails(pane) => pane.render(frame),
        }
    }

    #[cfg(test)]
    fn table(&self) -> Option<&ScrollTable> {
        match &self.body {
            Body::Nodes(table) | Body::Pods(table) | Body::Events(table) => Some(table),
            Body::PodDetails(_) | Body::EventDetails(_) => None,
        }
    }
}
