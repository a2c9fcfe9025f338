use anyhow::Result;
use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::aggregate::Aggregator;
use crate::format::{
    format_age, format_bytes, format_cpu, format_timestamp, render_cpu_limit, render_memory_limit,
};
use crate::k8s::ClusterSource;
use crate::model::{ContainerDetail, EventRow, PodDetail};
use crate::table::{Column, Motion, Row, ScrollTable};
use crate::ui::{ACCENT, MUTED};

/// Content rows the pod header reserves even for sparse pods.
const MIN_HEADER_LINES: u16 = 8;
const MAX_HEADER_EVENTS: usize = 5;
const LABEL_WIDTH: usize = 15;

/// Offset into a scrollable text pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PaneScroll {
    offset: usize,
}

impl PaneScroll {
    #[cfg(test)]
    fn offset(self) -> usize {
        self.offset
    }

    fn navigate(&mut self, motion: Motion, len: usize, page: usize) {
        let page = page.max(1);
        let half = (page / 2).max(1);
        let offset = match motion {
            Motion::Up => self.offset.saturating_sub(1),
            Motion::Down => self.offset.saturating_add(1),
            Motion::HalfPageUp => self.offset.saturating_sub(half),
            Motion::HalfPageDown => self.offset.saturating_add(half),
            Motion::PageUp => self.offset.saturating_sub(page),
            Motion::PageDown => self.offset.saturating_add(page),
            Motion::Top => 0,
            Motion::Bottom => usize::MAX,
        };
        self.offset = offset.min(len.saturating_sub(1));
    }

    fn clamp(&mut self, len: usize) {
        self.offset = self.offset.min(len.saturating_sub(1));
    }

    fn as_u16(self) -> u16 {
        u16::try_from(self.offset).unwrap_or(u16::MAX)
    }
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{:<LABEL_WIDTH$}", format!("{label}:")),
            Style::default().fg(MUTED),
        ),
        Span::raw(value.into()),
    ])
}

/// A label line followed by one line per value; the first value shares the
/// label's line.
fn field_list(label: &str, values: Vec<String>) -> Vec<Line<'static>> {
    if values.is_empty() {
        return vec![field(label, "")];
    }
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            if index == 0 {
                field(label, value)
            } else {
                Line::from(format!("{:LABEL_WIDTH$}{value}", ""))
            }
        })
        .collect()
}

fn pane_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ))
}

fn container_columns() -> Vec<Column> {
    vec![
        Column::elastic("NAME", 180, 40),
        Column::fixed("RESTARTS", 20),
        Column::fixed("STATUS", 40),
        Column::fixed("CPU", 20),
        Column::fixed("CPU MIN", 20),
        Column::fixed("CPU MAX", 20),
        Column::fixed("MEMORY", 20),
        Column::fixed("MEMORY MIN", 20),
        Column::fixed("MEMORY MAX", 20),
    ]
}

fn container_cells(container: &ContainerDetail) -> Row {
    vec![
        container.name.clone(),
        container.restarts.to_string(),
        container.status.clone(),
        format_cpu(container.cpu_used),
        render_cpu_limit(container.cpu_request, 1, 1),
        render_cpu_limit(container.cpu_limit, 1, 1),
        format_bytes(container.memory_used),
        render_memory_limit(container.memory_request, 1, 1),
        render_memory_limit(container.memory_limit, 1, 1),
    ]
}

fn summary_lines(detail: &PodDetail) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("Name", detail.name.clone()),
        field("Namespace", detail.namespace.clone()),
        field("Node", detail.node.clone()),
        field("Status", detail.status.clone()),
        field("Start Time", format_timestamp(detail.created)),
        field("IP", detail.ip.clone()),
    ];
    lines.extend(field_list(
        "Controlled By",
        detail.controllers.iter().map(ToString::to_string).collect(),
    ));
    lines.extend(field_list(
        "Events",
        detail
            .events
            .iter()
            .take(MAX_HEADER_EVENTS)
            .map(|event| format!("{}: {}", format_timestamp(event.last_seen), event.message))
            .collect(),
    ));
    lines
}

fn metadata_lines(detail: &PodDetail) -> Vec<Line<'static>> {
    let pairs = |map: &std::collections::BTreeMap<String, String>| {
        map.iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
    };
    let mut lines = field_list("Labels", pairs(&detail.labels));
    lines.extend(field_list("Annotations", pairs(&detail.annotations)));
    lines
}

/// Header box height: the taller of the two sections, at least
/// `MIN_HEADER_LINES`, plus borders.
fn header_height(summary: usize, metadata: usize) -> u16 {
    let content = u16::try_from(summary.max(metadata)).unwrap_or(u16::MAX);
    content.max(MIN_HEADER_LINES).saturating_add(2)
}

struct PodLayout {
    summary: Rect,
    metadata: Rect,
    containers: Rect,
    logs: Rect,
}

#[derive(Debug, Clone)]
pub struct PodDetailsPane {
    namespace: String,
    name: String,
    detail: Option<PodDetail>,
    containers: ScrollTable,
    logs: PaneScroll,
    area: Rect,
}

impl PodDetailsPane {
    pub fn new(namespace: String, name: String) -> Self {
        Self {
            namespace,
            name,
            detail: None,
            containers: ScrollTable::new(container_columns(), 0).without_location(),
            logs: PaneScroll::default(),
            area: Rect::default(),
        }
    }

    #[cfg(test)]
    fn detail(&self) -> Option<&PodDetail> {
        self.detail.as_ref()
    }

    #[cfg(test)]
    fn selected_container(&self) -> usize {
        self.containers.selected_row()
    }

    #[cfg(test)]
    fn log_offset(&self) -> usize {
        self.logs.offset()
    }

    pub async fn update<C: ClusterSource>(
        &mut self,
        aggregator: &Aggregator<'_, C>,
    ) -> Result<()> {
        let detail = aggregator
            .pod_detail(&self.namespace, &self.name, self.containers.selected_row())
            .await?;
        self.containers
            .set_rows(detail.containers.iter().map(container_cells).collect());
        self.containers.select(detail.selected_container);
        self.logs.clamp(detail.log_lines.len());
        self.detail = Some(detail);
        self.resize(self.area);
        Ok(())
    }

    /// Next container, wrapping to the first. Returns whether logs need reloading.
    pub fn tab_next(&mut self) -> bool {
        if self.containers.is_empty() {
            return false;
        }
        if self.containers.selected_row() + 1 >= self.containers.len() {
            self.containers.scroll_top();
        } else {
            self.containers.scroll_down();
        }
        self.logs = PaneScroll::default();
        true
    }

    pub fn tab_prev(&mut self) -> bool {
        let before = self.containers.selected_row();
        self.containers.scroll_up();
        let changed = before != self.containers.selected_row();
        if changed {
            self.logs = PaneScroll::default();
        }
        changed
    }

    pub fn navigate(&mut self, motion: Motion) {
        let len = self.detail.as_ref().map_or(0, |detail| detail.log_lines.len());
        let page = usize::from(self.layout().logs.height.saturating_sub(2));
        self.logs.navigate(motion, len, page);
    }

    pub fn resize(&mut self, area: Rect) {
        self.area = area;
        let containers = self.layout().containers;
        self.containers.set_area(Block::default().borders(Borders::ALL).inner(containers));
    }

    fn layout(&self) -> PodLayout {
        let (header, container_rows) = match &self.detail {
            Some(detail) => (
                header_height(summary_lines(detail).len(), metadata_lines(detail).len()),
                detail.containers.len(),
            ),
            None => (header_height(0, 0), 0),
        };
        let container_height = u16::try_from(container_rows)
            .unwrap_or(u16::MAX)
            .saturating_add(3);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header),
                Constraint::Length(container_height),
                Constraint::Min(0),
            ])
            .split(self.area);
        let header = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        PodLayout {
            summary: header[0],
            metadata: header[1],
            containers: rows[1],
            logs: rows[2],
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let layout = self.layout();
        let Some(detail) = &self.detail else {
            frame.render_widget(
                Paragraph::new("Loading…")
                    .block(pane_block(format!("Pod {}/{}", self.namespace, self.name))),
                layout.summary,
            );
            return;
        };

        frame.render_widget(
            Paragraph::new(summary_lines(detail)).block(pane_block(format!(
                "Pod {}/{}",
                detail.namespace, detail.name
            ))),
            layout.summary,
        );
        frame.render_widget(
            Paragraph::new(metadata_lines(detail)).block(pane_block("Metadata".to_string())),
            layout.metadata,
        );

        let containers_block = pane_block(format!("Containers ({})", detail.containers.len()));
        let table_area = containers_block.inner(layout.containers);
        frame.render_widget(containers_block, layout.containers);
        frame.render_widget(&self.containers, table_area);

        let container = detail
            .containers
            .get(detail.selected_container)
            .map(|container| container.name.as_str())
            .unwrap_or("-");
        let lines = detail
            .log_lines
            .iter()
            .map(|line| Line::from(line.clone()))
            .collect::<Vec<_>>();
        frame.render_widget(
            Paragraph::new(lines)
                .block(pane_block(format!("Logs {container} (newest first)")))
                .scroll((self.logs.as_u16(), 0)),
            layout.logs,
        );
    }
}

fn event_lines(event: &EventRow, now: DateTime<Utc>) -> Vec<Line<'static>> {
    vec![
        field("UID", event.uid.clone()),
        field("Name", event.name.clone()),
        field("Namespace", event.namespace.clone()),
        field("Node", event.node.clone()),
        field("Age", format_age(event.last_seen, now)),
        field("First Time", format_timestamp(event.first_seen)),
        field("Last Time", format_timestamp(event.last_seen)),
        field("Count", event.count.to_string()),
        field("Type", event.event_type.clone()),
        field("Kind", event.kind.clone()),
        field("Reason", event.reason.clone()),
        field("Source", event.source.clone()),
    ]
}

/// Lines `text` occupies when wrapped at `width` columns.
fn wrapped_len(text: &str, width: u16) -> usize {
    let width = usize::from(width.max(1));
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum()
}

#[derive(Debug, Clone)]
pub struct EventDetailsPane {
    namespace: String,
    name: String,
    event: Option<EventRow>,
    message: PaneScroll,
    area: Rect,
}

impl EventDetailsPane {
    pub fn new(namespace: String, name: String) -> Self {
        Self {
            namespace,
            name,
            event: None,
            message: PaneScroll::default(),
            area: Rect::default(),
        }
    }

    pub async fn update<C: ClusterSource>(
        &mut self,
        aggregator: &Aggregator<'_, C>,
    ) -> Result<()> {
        self.event = Some(aggregator.event_detail(&self.namespace, &self.name).await?);
        Ok(())
    }

    pub fn resize(&mut self, area: Rect) {
        self.area = area;
    }

    fn layout(&self) -> (Rect, Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(14), Constraint::Min(0)])
            .split(self.area);
        (rows[0], rows[1])
    }

    pub fn navigate(&mut self, motion: Motion) {
        let (_, message) = self.layout();
        let inner = Block::default().borders(Borders::ALL).inner(message);
        let len = self
            .event
            .as_ref()
            .map_or(0, |event| wrapped_len(&event.message, inner.width));
        self.message
            .navigate(motion, len, usize::from(inner.height));
    }

    pub fn render(&self, frame: &mut Frame) {
        let (fields, message) = self.layout();
        let title = format!("Event {}/{}", self.namespace, self.name);
        let Some(event) = &self.event else {
            frame.render_widget(Paragraph::new("Loading…").block(pane_block(title)), fields);
            return;
        };

        frame.render_widget(
            Paragraph::new(event_lines(event, Utc::now())).block(pane_block(title)),
            fields,
        );
        frame.render_widget(
            Paragraph::new(event.message.clone())
                .block(pane_block("Message".to_string()))
                .wrap(Wrap { trim: false })
                .scroll((self.message.as_u16(), 0)),
            message,
        );
    }
}
