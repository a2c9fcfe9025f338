use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::format::compact_text;
use crate::model::{Filter, SortKey, ViewKind};
use crate::ui::{BG, ERROR, PL_A, PL_B, PL_C, PL_D, WARN};

const MIN_ERROR_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Sort,
    Filter,
    Paused,
    Live,
    Error,
}

impl Tone {
    fn colors(self) -> (Color, Color) {
        match self {
            Self::Sort => (Color::White, PL_A),
            Self::Filter => (Color::White, PL_B),
            Self::Paused => (Color::Black, WARN),
            Self::Live => (Color::White, PL_D),
            Self::Error => (Color::Black, ERROR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tone: Tone,
}

impl Segment {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Bottom row summarising the active view. Built fresh for every frame.
#[derive(Debug, Clone)]
pub struct StatusBar<'a> {
    kind: ViewKind,
    sort: SortKey,
    filter: &'a Filter,
    paused: bool,
    error: Option<&'a str>,
    cluster: &'a str,
}

impl<'a> StatusBar<'a> {
    pub fn new(
        kind: ViewKind,
        sort: SortKey,
        filter: &'a Filter,
        paused: bool,
        cluster: &'a str,
    ) -> Self {
        Self {
            kind,
            sort,
            filter,
            paused,
            error: None,
            cluster,
        }
    }

    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    pub fn segments(&self) -> Vec<Segment> {
        let dash = |value: Option<&str>| value.unwrap_or("-").to_string();
        let sort = Segment::new(format!("[F1] Sorted by {}", self.sort), Tone::Sort);
        let namespace = Segment::new(
            format!("[F2] Namespace: {}", dash(self.filter.namespace.as_deref())),
            Tone::Filter,
        );

        let mut segments = match self.kind {
            ViewKind::Nodes => vec![sort],
            ViewKind::Pods => vec![
                sort,
                namespace,
                Segment::new(
                    format!("[F3] Node: {}", dash(self.filter.node.as_deref())),
                    Tone::Filter,
                ),
                Segment::new(
                    format!(
                        "[F4] Status: {}",
                        dash(self.filter.status.map(|rank| rank.label()))
                    ),
                    Tone::Filter,
                ),
            ],
            ViewKind::Events => vec![
                sort,
                namespace,
                Segment::new(
                    format!(
                        "[F4] Type: {}",
                        dash(self.filter.event_type.map(|kind| kind.label()))
                    ),
                    Tone::Filter,
                ),
            ],
            ViewKind::PodDetails | ViewKind::EventDetails => Vec::new(),
        };

        segments.push(if self.paused {
            Segment::new("[P] Paused", Tone::Paused)
        } else {
            Segment::new("[P] Updated", Tone::Live)
        });
        if let Some(error) = self.error {
            segments.push(Segment::new(error, Tone::Error));
        }
        segments
    }
}

fn display_cluster_endpoint(cluster: &str) -> &str {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
}

fn push_powerline_segment(spans: &mut Vec<Span<'static>>, segment: &Segment, next_bg: Color) {
    let (fg, bg) = segment.tone.colors();
    spans.push(Span::styled(
        format!(" {} ", segment.text),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("\u{e0b0}", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        buf.set_style(area, Style::default().bg(BG));

        let cluster = format!(" {} ", display_cluster_endpoint(self.cluster));
        let cluster_width = cluster.chars().count();

        let mut segments = self.segments();
        let used = segments
            .iter()
            .filter(|segment| segment.tone != Tone::Error)
            .map(|segment| segment.text.chars().count() + 3)
            .sum::<usize>();
        if let Some(error) = segments.last_mut().filter(|segment| segment.tone == Tone::Error) {
            let room = usize::from(area.width)
                .saturating_sub(used + cluster_width + 3)
                .max(MIN_ERROR_WIDTH);
            error.text = compact_text(&error.text, room);
        }

        let mut spans = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            let next_bg = segments
                .get(index + 1)
                .map(|next| next.tone.colors().1)
                .unwrap_or(BG);
            push_powerline_segment(&mut spans, segment, next_bg);
        }
        let left_width = spans_width(&spans);
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);

        let right_width = u16::try_from(cluster_width).unwrap_or(u16::MAX);
        if left_width + cluster_width <= usize::from(area.width) {
            let x = area.right().saturating_sub(right_width);
            buf.set_line(
                x,
                area.y,
                &Line::from(Span::styled(cluster, Style::default().fg(Color::Black).bg(PL_C))),
                right_width,
            );
        }
    }
}
