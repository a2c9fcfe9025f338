use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

use crate::model::{EventType, Filter, SortKey, StatusRank, ViewKind};
use crate::ui::{ACCENT, PANEL, WARN};

const LIST_WIDTH: u16 = 50;
const LIST_HEIGHT: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Sort,
    Namespace,
    Node,
    Status,
    EventType,
    View,
}

impl ListKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Sort => "Sort by ...",
            Self::Namespace => "Filter by Namespace ...",
            Self::Node => "Filter by Node ...",
            Self::Status => "Filter by Status ...",
            Self::EventType => "Filter by Event Type ...",
            Self::View => "Select View ...",
        }
    }

    /// Whether the choices come from the cluster rather than a fixed table.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Namespace | Self::Node)
    }

    pub fn available_in(self, view: ViewKind) -> bool {
        match view {
            ViewKind::Nodes => matches!(self, Self::Sort | Self::View),
            ViewKind::Pods => !matches!(self, Self::EventType),
            ViewKind::Events => !matches!(self, Self::Node | Self::Status),
            ViewKind::PodDetails | ViewKind::EventDetails => self == Self::View,
        }
    }
}

/// Fixed enumerations offered by the overlay, per view kind.
#[derive(Debug, Clone)]
pub struct ListCatalog {
    pub node_sorts: Vec<SortKey>,
    pub pod_sorts: Vec<SortKey>,
    pub event_sorts: Vec<SortKey>,
    pub statuses: Vec<Option<StatusRank>>,
    pub event_types: Vec<Option<EventType>>,
    pub views: Vec<ViewKind>,
}

impl Default for ListCatalog {
    fn default() -> Self {
        Self {
            node_sorts: ViewKind::Nodes.sort_keys().to_vec(),
            pod_sorts: ViewKind::Pods.sort_keys().to_vec(),
            event_sorts: ViewKind::Events.sort_keys().to_vec(),
            statuses: vec![
                None,
                Some(StatusRank::Running),
                Some(StatusRank::Waiting),
                Some(StatusRank::Terminated),
            ],
            event_types: vec![None, Some(EventType::Normal), Some(EventType::Warning)],
            views: ViewKind::SWITCHABLE.to_vec(),
        }
    }
}

impl ListCatalog {
    pub fn sorts_for(&self, view: ViewKind) -> &[SortKey] {
        match view {
            ViewKind::Nodes => &self.node_sorts,
            ViewKind::Pods => &self.pod_sorts,
            ViewKind::Events => &self.event_sorts,
            ViewKind::PodDetails | ViewKind::EventDetails => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Sort(SortKey),
    Namespace(Option<String>),
    Node(Option<String>),
    Status(Option<StatusRank>),
    EventType(Option<EventType>),
    View(ViewKind),
}

impl Choice {
    fn label(&self) -> String {
        let dash = || "-".to_string();
        match self {
            Self::Sort(key) => key.label().to_string(),
            Self::Namespace(value) | Self::Node(value) => value.clone().unwrap_or_else(dash),
            Self::Status(rank) => rank.map(|rank| rank.label().to_string()).unwrap_or_else(dash),
            Self::EventType(kind) => kind
                .map(|kind| kind.label().to_string())
                .unwrap_or_else(dash),
            Self::View(view) => view.title().to_string(),
        }
    }
}

/// What the caller should switch to after a confirmed choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub view: ViewKind,
    pub sort: SortKey,
    pub filter: Filter,
}

/// Overlay list. It is shown exactly when its area is non-empty.
#[derive(Debug, Clone)]
pub struct SelectionList {
    catalog: ListCatalog,
    kind: ListKind,
    choices: Vec<Choice>,
    selected: usize,
    area: Rect,
}

impl SelectionList {
    pub fn new(catalog: ListCatalog) -> Self {
        Self {
            catalog,
            kind: ListKind::View,
            choices: Vec::new(),
            selected: 0,
            area: Rect::default(),
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.area.is_empty()
    }

    #[cfg(test)]
    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn labels(&self) -> Vec<String> {
        self.choices
            .iter()
            .enumerate()
            .map(|(index, choice)| format!("[{index}] {}", choice.label()))
            .collect()
    }

    /// Opens a fixed-enumeration list for `view`.
    pub fn show(&mut self, kind: ListKind, view: ViewKind, bounds: Rect) {
        let choices = match kind {
            ListKind::Sort => self
                .catalog
                .sorts_for(view)
                .iter()
                .copied()
                .map(Choice::Sort)
                .collect(),
            ListKind::Status => self.catalog.statuses.iter().copied().map(Choice::Status).collect(),
            ListKind::EventType => self
                .catalog
                .event_types
                .iter()
                .copied()
                .map(Choice::EventType)
                .collect(),
            ListKind::View => self.catalog.views.iter().copied().map(Choice::View).collect(),
            ListKind::Namespace | ListKind::Node => Vec::new(),
        };
        self.open(kind, choices, bounds);
    }

    /// Opens a namespace or node list from a live query result. `None` means
    /// the query failed and the list stays empty.
    pub fn show_live(&mut self, kind: ListKind, values: Option<Vec<String>>, bounds: Rect) {
        let wrap = match kind {
            ListKind::Node => Choice::Node,
            _ => Choice::Namespace,
        };
        let choices = match values {
            Some(values) => std::iter::once(None)
                .chain(values.into_iter().map(Some))
                .map(wrap)
                .collect(),
            None => Vec::new(),
        };
        self.open(kind, choices, bounds);
    }

    fn open(&mut self, kind: ListKind, choices: Vec<Choice>, bounds: Rect) {
        self.kind = kind;
        self.choices = choices;
        self.selected = 0;
        self.area = centered(bounds);
    }

    pub fn hide(&mut self) {
        self.area = Rect::default();
    }

    pub fn resize(&mut self, bounds: Rect) {
        if self.is_visible() {
            self.area = centered(bounds);
        }
    }

    pub fn scroll_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.selected + 1 < self.choices.len() {
            self.selected += 1;
        }
    }

    /// Maps the highlighted row onto the caller's current state and closes
    /// the list. An empty list yields the current state unchanged.
    pub fn confirm(&mut self, view: ViewKind, sort: SortKey, filter: &Filter) -> Selection {
        let mut selection = Selection {
            view,
            sort,
            filter: filter.clone(),
        };
        match self.choices.get(self.selected).cloned() {
            Some(Choice::Sort(key)) => selection.sort = key,
            Some(Choice::Namespace(namespace)) => selection.filter.namespace = namespace,
            Some(Choice::Node(node)) => selection.filter.node = node,
            Some(Choice::Status(status)) => selection.filter.status = status,
            Some(Choice::EventType(event_type)) => selection.filter.event_type = event_type,
            Some(Choice::View(target)) => selection.view = target,
            None => {}
        }
        self.hide();
        selection
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = self.area.intersection(frame.area());
        if area.is_empty() {
            return;
        }

        let items = self
            .labels()
            .into_iter()
            .map(|label| ListItem::new(Line::from(label)))
            .collect::<Vec<_>>();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .title(self.kind.title())
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(WARN))
            .highlight_style(Style::default().fg(PANEL).bg(WARN).add_modifier(Modifier::BOLD));
        let mut state = ListState::default().with_selected(Some(self.selected));

        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn centered(bounds: Rect) -> Rect {
    let width = LIST_WIDTH.min(bounds.width);
    let height = LIST_HEIGHT.min(bounds.height);
    Rect::new(
        bounds.x + (bounds.width - width) / 2,
        bounds.y + (bounds.height - height) / 2,
        width,
        height,
    )
}
