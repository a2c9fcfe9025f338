use anyhow::Result;
use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::aggregate::{Aggregator, DEFAULT_LOG_TAIL_LINES};
use crate::config::SortDefaults;
use crate::input::Action;
use crate::k8s::ClusterSource;
use crate::list::{ListCatalog, ListKind, SelectionList};
use crate::model::{Filter, ViewKind};
use crate::statusbar::StatusBar;
use crate::table::Motion;
use crate::ui;
use crate::view::{
    EVENT_NAME_COLUMN, EVENT_NAMESPACE_COLUMN, NODE_NAME_COLUMN, POD_NAME_COLUMN,
    POD_NAMESPACE_COLUMN, View,
};

/// Side effect the run loop performs after an action has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Refresh,
    LoadListOptions(ListKind),
}

pub struct App {
    running: bool,
    view: View,
    list: SelectionList,
    sorts: SortDefaults,
    cluster: String,
    log_tail_lines: i64,
    refresh_error: Option<String>,
    pending_g: bool,
    area: Rect,
}

impl App {
    pub fn new(kind: ViewKind, filter: Filter, sorts: SortDefaults, cluster: String) -> Self {
        Self {
            running: true,
            view: View::list_sorted(kind, filter, sorts.for_view(kind)),
            list: SelectionList::new(ListCatalog::default()),
            sorts,
            cluster,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            refresh_error: None,
            pending_g: false,
            area: Rect::default(),
        }
    }

    pub fn with_log_tail(mut self, lines: i64) -> Self {
        self.log_tail_lines = lines;
        self
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn list(&self) -> &SelectionList {
        &self.list
    }

    #[cfg(test)]
    pub fn refresh_error(&self) -> Option<&str> {
        self.refresh_error.as_deref()
    }

    pub fn set_refresh_error(&mut self, error: impl Into<String>) {
        self.refresh_error = Some(error.into());
    }

    pub fn status_bar(&self) -> StatusBar<'_> {
        StatusBar::new(
            self.view.kind(),
            self.view.sort_order(),
            self.view.filter(),
            self.view.is_paused(),
            &self.cluster,
        )
        .error(self.refresh_error.as_deref())
    }

    /// Recomputes every widget rectangle for a terminal of `area`.
    pub fn resize(&mut self, area: Rect) {
        if area == self.area {
            return;
        }
        self.area = area;
        let (view_area, _) = ui::screen_areas(area);
        self.view.resize(view_area);
        self.list.resize(area);
    }

    /// Re-runs the active view's query. A failure leaves the previous rows in
    /// place; a success clears any error shown from an earlier attempt.
    pub async fn refresh<C: ClusterSource>(&mut self, source: &C) -> Result<()> {
        let aggregator = Aggregator::new(source).with_log_tail(self.log_tail_lines);
        self.view.update(&aggregator).await?;
        self.refresh_error = None;
        Ok(())
    }

    /// Opens a namespace or node list with the values fetched for it.
    pub fn show_live_list(&mut self, kind: ListKind, values: Option<Vec<String>>) {
        self.list.show_live(kind, values, self.area);
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if !matches!(action, Action::GPrefix) {
            self.pending_g = false;
        }

        match action {
            Action::Quit => {
                self.running = false;
                AppCommand::None
            }
            Action::Up => {
                if self.list.is_visible() {
                    self.list.scroll_up();
                    AppCommand::None
                } else {
                    self.navigate(Motion::Up)
                }
            }
            Action::Down => {
                if self.list.is_visible() {
                    self.list.scroll_down();
                    AppCommand::None
                } else {
                    self.navigate(Motion::Down)
                }
            }
            Action::GPrefix => {
                if self.pending_g {
                    self.pending_g = false;
                    self.navigate(Motion::Top)
                } else {
                    self.pending_g = true;
                    AppCommand::None
                }
            }
            Action::Top => self.navigate(Motion::Top),
            Action::Bottom => self.navigate(Motion::Bottom),
            Action::HalfPageUp => self.navigate(Motion::HalfPageUp),
            Action::HalfPageDown => self.navigate(Motion::HalfPageDown),
            Action::PageUp => self.navigate(Motion::PageUp),
            Action::PageDown => self.navigate(Motion::PageDown),
            Action::TogglePause => {
                self.view.toggle_pause();
                AppCommand::Refresh
            }
            Action::Enter => {
                if self.list.is_visible() {
                    self.apply_selection()
                } else {
                    self.drill_down()
                }
            }
            Action::Escape => {
                if self.list.is_visible() {
                    self.list.hide();
                    return AppCommand::None;
                }
                match self.view.parent() {
                    Some(parent) => self.switch_to(parent),
                    None => AppCommand::None,
                }
            }
            Action::OpenSort => self.open_list(ListKind::Sort),
            Action::OpenNamespaceFilter => self.open_list(ListKind::Namespace),
            Action::OpenNodeFilter => self.open_list(ListKind::Node),
            Action::OpenStateFilter => match self.view.kind() {
                ViewKind::Events => self.open_list(ListKind::EventType),
                _ => self.open_list(ListKind::Status),
            },
            Action::OpenViewList => self.open_list(ListKind::View),
            Action::TabNext => self.tab(View::tab_next),
            Action::TabPrev => self.tab(View::tab_prev),
        }
    }

    fn navigate(&mut self, motion: Motion) -> AppCommand {
        if !self.list.is_visible() {
            self.view.navigate(motion);
        }
        AppCommand::None
    }

    fn tab(&mut self, step: fn(&mut View) -> bool) -> AppCommand {
        if !self.list.is_visible() && step(&mut self.view) {
            AppCommand::Refresh
        } else {
            AppCommand::None
        }
    }

    fn open_list(&mut self, kind: ListKind) -> AppCommand {
        if !kind.available_in(self.view.kind()) {
            debug!("{kind:?} list is not available in the {} view", self.view.kind());
            return AppCommand::None;
        }
        if kind.is_live() {
            return AppCommand::LoadListOptions(kind);
        }
        self.list.show(kind, self.view.kind(), self.area);
        AppCommand::None
    }

    fn apply_selection(&mut self) -> AppCommand {
        let selection =
            self.list
                .confirm(self.view.kind(), self.view.sort_order(), self.view.filter());
        if selection.view != self.view.kind() {
            let kind = selection.view;
            return self.switch_to(View::list_sorted(
                kind,
                Filter::default(),
                self.sorts.for_view(kind),
            ));
        }
        self.view.set_sort_and_filter(selection.sort, selection.filter);
        AppCommand::Refresh
    }

    fn drill_down(&mut self) -> AppCommand {
        let values = self.view.selected_values();
        if values.is_empty() {
            return AppCommand::None;
        }
        let value = |index: usize| values.get(index).cloned().unwrap_or_default();
        let filter = self.view.filter().clone();
        let sort = self.view.sort_order();

        let next = match self.view.kind() {
            ViewKind::Nodes => View::list_sorted(
                ViewKind::Pods,
                Filter {
                    node: Some(value(NODE_NAME_COLUMN)),
                    ..filter
                },
                self.sorts.pods,
            ),
            ViewKind::Pods => View::pod_details(
                value(POD_NAMESPACE_COLUMN),
                value(POD_NAME_COLUMN),
                filter,
                sort,
            ),
            ViewKind::Events => View::event_details(
                value(EVENT_NAMESPACE_COLUMN),
                value(EVENT_NAME_COLUMN),
                filter,
                sort,
            ),
            ViewKind::PodDetails | ViewKind::EventDetails => return AppCommand::None,
        };
        self.switch_to(next)
    }

    fn switch_to(&mut self, mut view: View) -> AppCommand {
        info!("switching from {} to {} view", self.view.kind(), view.kind());
        let (view_area, _) = ui::screen_areas(self.area);
        view.resize(view_area);
        self.view = view;
        AppCommand::Refresh
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand};
    use crate::config::SortDefaults;
    use crate::input::Action;
    use crate::list::ListKind;
    use crate::model::{EventType, Filter, NodeUsage, SortKey, StatusRank, ViewKind};
    use crate::testing::{FakeCluster, event, node, pod, usage};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;

    fn new_app(kind: ViewKind, filter: Filter) -> App {
        let mut app = App::new(kind, filter, SortDefaults::default(), "cluster".to_string());
        app.resize(Rect::new(0, 0, 200, 40));
        app
    }

    fn render_view(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(200, 40)).unwrap();
        terminal
            .draw(|frame| app.view().render(frame, frame.area()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn cluster() -> FakeCluster {
        FakeCluster {
            nodes: vec![node("node-a", "2", "2Gi", "10.1.0.1")],
            node_usage: vec![NodeUsage {
                name: "node-a".to_string(),
                cpu_millis: 100,
                memory_bytes: 1024,
            }],
            pods: vec![pod("prod", "api", "node-a"), pod("dev", "web", "node-b")],
            pod_usage: vec![usage("prod", "api", &[])],
            events: vec![event("prod", "api.1", "api", "Warning", 1_700_000_100)],
            namespaces: vec!["dev".to_string(), "prod".to_string()],
            ..FakeCluster::default()
        }
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut app = new_app(ViewKind::Pods, Filter::default());
        assert!(app.running());
        assert_eq!(app.apply_action(Action::Quit), AppCommand::None);
        assert!(!app.running());
    }

    #[tokio::test]
    async fn double_g_jumps_to_top() {
        let cluster = cluster();
        let mut app = new_app(ViewKind::Pods, Filter::default());
        app.refresh(&cluster).await.unwrap();
        app.apply_action(Action::Bottom);
        assert_eq!(app.view().selected_values()[1], "api");

        app.apply_action(Action::GPrefix);
        app.apply_action(Action::Down);
        app.apply_action(Action::GPrefix);
        assert_eq!(app.view().selected_values()[1], "api");

        app.apply_action(Action::GPrefix);
        assert_eq!(app.view().selected_values()[1], "web");
    }

    #[tokio::test]
    async fn enter_on_node_opens_its_pods() {
        let cluster = cluster();
        let mut app = new_app(ViewKind::Nodes, Filter::default());
        app.refresh(&cluster).await.unwrap();

        assert_eq!(app.apply_action(Action::Enter), AppCommand::Refresh);
        assert_eq!(app.view().kind(), ViewKind::Pods);
        assert_eq!(app.view().filter().node.as_deref(), Some("node-a"));
        assert_eq!(app.view().sort_order(), SortKey::Namespace);

        app.refresh(&cluster).await.unwrap();
        assert_eq!(app.view().selected_values()[1], "api");
    }

    #[tokio::test]
    async fn node_drill_down_keeps_namespace_filter() {
        let cluster = cluster();
        let filter = Filter::with_namespace(Some("dev".to_string()));
        let mut app = new_app(ViewKind::Nodes, filter);
        app.refresh(&cluster).await.unwrap();

        app.apply_action(Action::Enter);
        assert_eq!(app.view().filter().namespace.as_deref(), Some("dev"));
        assert_eq!(app.view().filter().node.as_deref(), Some("node-a"));

        app.refresh(&cluster).await.unwrap();
        assert!(app.view().selected_values().is_empty());
    }

    #[tokio::test]
    async fn escape_from_details_restores_parent_list() {
        let cluster = cluster();
        let filter = Filter::with_namespace(Some("prod".to_string()));
        let mut app = new_app(ViewKind::Pods, filter.clone());
        app.apply_action(Action::OpenSort);
        app.apply_action(Action::Down);
        app.apply_action(Action::Enter);
        assert_eq!(app.view().sort_order(), SortKey::CpuDesc);
        app.refresh(&cluster).await.unwrap();

        assert_eq!(app.apply_action(Action::Enter), AppCommand::Refresh);
        assert_eq!(app.view().kind(), ViewKind::PodDetails);
        app.refresh(&cluster).await.unwrap();

        assert_eq!(app.apply_action(Action::Escape), AppCommand::Refresh);
        assert_eq!(app.view().kind(), ViewKind::Pods);
        assert_eq!(app.view().filter(), &filter);
        assert_eq!(app.view().sort_order(), SortKey::CpuDesc);
    }

    #[tokio::test]
    async fn enter_on_event_opens_event_details() {
        let cluster = cluster();
        let mut app = new_app(ViewKind::Events, Filter::default());
        app.refresh(&cluster).await.unwrap();

        app.apply_action(Action::Enter);
        assert_eq!(app.view().kind(), ViewKind::EventDetails);
        app.refresh(&cluster).await.unwrap();
        assert_eq!(app.status_bar().segments().len(), 1);
    }

    #[test]
    fn switching_views_resets_filter_and_pause() {
        let mut app = new_app(ViewKind::Pods, Filter::with_namespace(Some("prod".to_string())));
        app.apply_action(Action::TogglePause);
        assert!(app.view().is_paused());

        app.apply_action(Action::OpenViewList);
        assert!(app.list().is_visible());
        app.apply_action(Action::Down);
        assert_eq!(app.apply_action(Action::Enter), AppCommand::Refresh);

        assert!(!app.list().is_visible());
        assert_eq!(app.view().kind(), ViewKind::Nodes);
        assert_eq!(app.view().filter(), &Filter::default());
        assert!(!app.view().is_paused());
    }

    #[test]
    fn choosing_current_view_keeps_state() {
        let filter = Filter::with_namespace(Some("prod".to_string()));
        let mut app = new_app(ViewKind::Pods, filter.clone());
        app.apply_action(Action::TogglePause);

        app.apply_action(Action::OpenViewList);
        app.apply_action(Action::Enter);
        assert_eq!(app.view().kind(), ViewKind::Pods);
        assert_eq!(app.view().filter(), &filter);
        assert!(app.view().is_paused());
    }

    #[test]
    fn unavailable_lists_do_nothing() {
        let mut app = new_app(ViewKind::Nodes, Filter::default());
        assert_eq!(app.apply_action(Action::OpenNodeFilter), AppCommand::None);
        assert_eq!(app.apply_action(Action::OpenStateFilter), AppCommand::None);
        assert!(!app.list().is_visible());
    }

    #[test]
    fn state_filter_follows_view() {
        let mut app = new_app(ViewKind::Events, Filter::default());
        app.apply_action(Action::OpenStateFilter);
        assert_eq!(app.list().kind(), ListKind::EventType);
        app.apply_action(Action::Down);
        app.apply_action(Action::Down);
        app.apply_action(Action::Enter);
        assert_eq!(app.view().filter().event_type, Some(EventType::Warning));

        let mut app = new_app(ViewKind::Pods, Filter::default());
        app.apply_action(Action::OpenStateFilter);
        assert_eq!(app.list().kind(), ListKind::Status);
        app.apply_action(Action::Down);
        app.apply_action(Action::Enter);
        assert_eq!(app.view().filter().status, Some(StatusRank::Running));
    }

    #[test]
    fn live_lists_are_requested_then_applied() {
        let mut app = new_app(ViewKind::Pods, Filter::default());
        assert_eq!(
            app.apply_action(Action::OpenNamespaceFilter),
            AppCommand::LoadListOptions(ListKind::Namespace)
        );
        app.show_live_list(
            ListKind::Namespace,
            Some(vec!["dev".to_string(), "prod".to_string()]),
        );
        assert_eq!(app.list().labels(), vec!["[0] -", "[1] dev", "[2] prod"]);

        app.apply_action(Action::Down);
        app.apply_action(Action::Down);
        assert_eq!(app.apply_action(Action::Enter), AppCommand::Refresh);
        assert_eq!(app.view().filter().namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn escape_with_overlay_only_closes_it() {
        let mut app = new_app(ViewKind::Pods, Filter::default());
        app.apply_action(Action::OpenSort);
        assert_eq!(app.apply_action(Action::Escape), AppCommand::None);
        assert!(!app.list().is_visible());
        assert_eq!(app.view().kind(), ViewKind::Pods);
        assert_eq!(app.view().sort_order(), SortKey::Namespace);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_rows() {
        let mut cluster = cluster();
        let mut app = new_app(ViewKind::Pods, Filter::default());
        app.refresh(&cluster).await.unwrap();
        app.apply_action(Action::Down);
        let selected = app.view().selected_values();
        let rendered = render_view(&app);
        assert!(!selected.is_empty());

        cluster.failing = Some("list_pods");
        assert!(app.refresh(&cluster).await.is_err());
        app.set_refresh_error("list_pods unavailable");
        assert_eq!(app.view().selected_values(), selected);
        assert_eq!(render_view(&app), rendered);
        assert_eq!(app.refresh_error(), Some("list_pods unavailable"));

        cluster.failing = None;
        app.refresh(&cluster).await.unwrap();
        assert_eq!(app.refresh_error(), None);
    }

    #[test]
    fn tab_outside_pod_details_is_ignored() {
        let mut app = new_app(ViewKind::Pods, Filter::default());
        assert_eq!(app.apply_action(Action::TabNext), AppCommand::None);
        assert_eq!(app.apply_action(Action::TabPrev), AppCommand::None);
    }
}
