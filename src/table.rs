use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

use crate::ui::{CURSOR_STYLE, HEADER_STYLE};

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Up,
    Down,
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Fixed(u16),
    /// Absorbs whatever `reserved` leaves of the inner width, never below `min`.
    Elastic { reserved: u16, min: u16 },
    Hidden,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub title: &'static str,
    pub width: Width,
}

impl Column {
    pub const fn fixed(title: &'static str, width: u16) -> Self {
        Self {
            title,
            width: Width::Fixed(width),
        }
    }

    pub const fn elastic(title: &'static str, reserved: u16, min: u16) -> Self {
        Self {
            title,
            width: Width::Elastic { reserved, min },
        }
    }

    pub const fn hidden(title: &'static str) -> Self {
        Self {
            title,
            width: Width::Hidden,
        }
    }
}

/// Cursor-addressable grid whose cursor follows a row's unique-column value
/// across refreshes.
#[derive(Debug, Clone)]
pub struct ScrollTable {
    columns: Vec<Column>,
    widths: Vec<u16>,
    unique_column: usize,
    rows: Vec<Row>,
    selected_row: usize,
    top_row: usize,
    selected_identity: Option<String>,
    area: Rect,
    column_gap: u16,
    show_location: bool,
}

impl ScrollTable {
    pub fn new(columns: Vec<Column>, unique_column: usize) -> Self {
        let mut table = Self {
            widths: vec![0; columns.len()],
            columns,
            unique_column,
            rows: Vec::new(),
            selected_row: 0,
            top_row: 0,
            selected_identity: None,
            area: Rect::default(),
            column_gap: 1,
            show_location: true,
        };
        table.recompute_widths();
        table
    }

    pub fn without_location(mut self) -> Self {
        self.show_location = false;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    #[cfg(test)]
    pub fn top_row(&self) -> usize {
        self.top_row
    }

    #[cfg(test)]
    pub fn selected_identity(&self) -> Option<&str> {
        self.selected_identity.as_deref()
    }

    pub fn selected_values(&self) -> Vec<String> {
        self.rows
            .get(self.selected_row)
            .cloned()
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn widths(&self) -> &[u16] {
        &self.widths
    }

    /// Replaces the backing rows, relocating the cursor onto the row that
    /// carries the previously selected identity when it is still present.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        let unique_column = self.unique_column;
        if let Some(index) = self.selected_identity.as_deref().and_then(|identity| {
            self.rows
                .iter()
                .position(|row| row.get(unique_column).map(String::as_str) == Some(identity))
        }) {
            self.selected_row = index;
        }
        self.settle();
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
        self.recompute_widths();
        self.settle();
    }

    #[cfg(test)]
    pub fn area(&self) -> Rect {
        self.area
    }

    /// Rows that fit below the header.
    pub fn visible_rows(&self) -> usize {
        usize::from(self.area.height.saturating_sub(1)).max(1)
    }

    fn page_step(&self) -> usize {
        self.visible_rows().saturating_sub(1).max(1)
    }

    fn half_page_step(&self) -> usize {
        (self.page_step() / 2).max(1)
    }

    pub fn scroll_up(&mut self) {
        self.move_by(-1);
    }

    pub fn scroll_down(&mut self) {
        self.move_by(1);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.move_by(-(self.half_page_step() as isize));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.move_by(self.half_page_step() as isize);
    }

    pub fn scroll_page_up(&mut self) {
        self.move_by(-(self.page_step() as isize));
    }

    pub fn scroll_page_down(&mut self) {
        self.move_by(self.page_step() as isize);
    }

    pub fn scroll_top(&mut self) {
        self.selected_row = 0;
        self.settle();
    }

    pub fn scroll_bottom(&mut self) {
        self.selected_row = self.rows.len().saturating_sub(1);
        self.settle();
    }

    pub fn navigate(&mut self, motion: Motion) {
        match motion {
            Motion::Up => self.scroll_up(),
            Motion::Down => self.scroll_down(),
            Motion::HalfPageUp => self.scroll_half_page_up(),
            Motion::HalfPageDown => self.scroll_half_page_down(),
            Motion::PageUp => self.scroll_page_up(),
            Motion::PageDown => self.scroll_page_down(),
            Motion::Top => self.scroll_top(),
            Motion::Bottom => self.scroll_bottom(),
        }
    }

    /// Moves to `index`, clamped.
    pub fn select(&mut self, index: usize) {
        self.selected_row = index;
        self.settle();
    }

    fn move_by(&mut self, delta: isize) {
        self.selected_row = self.selected_row.saturating_add_signed(delta);
        self.settle();
    }

    /// Clamps the cursor, keeps it inside the visible window, and records the
    /// identity under it.
    fn settle(&mut self) {
        let last = self.rows.len().saturating_sub(1);
        self.selected_row = self.selected_row.min(last);

        let visible = self.visible_rows();
        if self.selected_row < self.top_row {
            self.top_row = self.selected_row;
        } else if self.selected_row >= self.top_row + visible {
            self.top_row = self.selected_row + 1 - visible;
        }

        self.selected_identity = self
            .rows
            .get(self.selected_row)
            .and_then(|row| row.get(self.unique_column))
            .cloned();
    }

    fn recompute_widths(&mut self) {
        let inner_width = self.area.width;
        self.widths = self
            .columns
            .iter()
            .map(|column| match column.width {
                Width::Fixed(width) => width,
                Width::Elastic { reserved, min } => inner_width.saturating_sub(reserved).max(min),
                Width::Hidden => 0,
            })
            .collect();
    }

    fn location(&self) -> String {
        if self.rows.is_empty() {
            return " 0 - 0 of 0 ".to_string();
        }
        let bottom = (self.top_row + self.visible_rows()).min(self.rows.len());
        format!(" {} - {} of {} ", self.top_row + 1, bottom, self.rows.len())
    }

    fn is_cursor(&self, index: usize, row: &Row) -> bool {
        match self.selected_identity.as_deref() {
            Some(identity) => row.get(self.unique_column).map(String::as_str) == Some(identity),
            None => index == self.selected_row,
        }
    }
}

impl Widget for &ScrollTable {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }

        // Column start offsets, relative to the area's left edge.
        let mut offsets = Vec::with_capacity(self.widths.len());
        let mut x = 0u16;
        for width in &self.widths {
            offsets.push(x);
            if *width > 0 {
                x = x.saturating_add(*width).saturating_add(self.column_gap);
            }
        }
        let fits = |index: usize| {
            let width = self.widths[index];
            width > 0 && offsets[index].saturating_add(width) <= area.width
        };

        let header = Rect { height: 1, ..area };
        buf.set_style(header, HEADER_STYLE);
        for (index, column) in self.columns.iter().enumerate() {
            if fits(index) {
                buf.set_stringn(
                    area.x + offsets[index],
                    area.y,
                    column.title,
                    usize::from(self.widths[index]),
                    HEADER_STYLE,
                );
            }
        }
        if self.show_location {
            let location = self.location();
            let width = location.chars().count() as u16;
            if width < area.width {
                buf.set_string(
                    area.x + area.width - width,
                    area.y,
                    location,
                    HEADER_STYLE.fg(Color::DarkGray),
                );
            }
        }

        let body_height = usize::from(area.height.saturating_sub(1));
        for (line, (index, row)) in self
            .rows
            .iter()
            .enumerate()
            .skip(self.top_row)
            .take(body_height)
            .enumerate()
        {
            let y = area.y + 1 + line as u16;
            let style = if self.is_cursor(index, row) {
                buf.set_style(Rect { y, height: 1, ..area }, CURSOR_STYLE);
                CURSOR_STYLE
            } else {
                Style::default()
            };
            for (column, text) in row.iter().enumerate().take(self.columns.len()) {
                if fits(column) {
                    buf.set_stringn(
                        area.x + offsets[column],
                        y,
                        text,
                        usize::from(self.widths[column]),
                        style,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, Row, ScrollTable};
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use ratatui::widgets::Widget;

    fn rows(ids: &[&str]) -> Vec<Row> {
        ids.iter()
            .map(|id| vec![id.to_string(), format!("value-{id}")])
            .collect()
    }

    fn table(height: u16) -> ScrollTable {
        let mut table = ScrollTable::new(
            vec![Column::fixed("ID", 6), Column::elastic("VALUE", 7, 10)],
            0,
        );
        table.set_area(Rect::new(0, 0, 40, height));
        table
    }

    fn line(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
    }

    #[test]
    fn cursor_follows_identity_across_reorder() {
        let mut table = table(10);
        table.set_rows(rows(&["a", "b", "c", "d"]));
        table.scroll_down();
        table.scroll_down();
        assert_eq!(table.selected_identity(), Some("c"));

        table.set_rows(rows(&["c", "d", "a", "b"]));

        assert_eq!(table.selected_identity(), Some("c"));
        assert_eq!(table.selected_row(), 0);
    }

    #[test]
    fn missing_identity_falls_back_to_clamped_index() {
        let mut table = table(10);
        table.set_rows(rows(&["a", "b", "c", "d"]));
        table.scroll_bottom();

        table.set_rows(rows(&["a", "b"]));

        assert_eq!(table.selected_row(), 1);
        assert_eq!(table.selected_identity(), Some("b"));
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let mut table = table(10);
        table.set_rows(rows(&["a", "b", "c"]));

        table.scroll_up();
        assert_eq!(table.selected_row(), 0);

        table.scroll_bottom();
        table.scroll_down();
        assert_eq!(table.selected_row(), 2);
    }

    #[test]
    fn paging_keeps_top_row_in_range() {
        let ids = (0..50).map(|i| format!("r{i:02}")).collect::<Vec<_>>();
        let ids = ids.iter().map(String::as_str).collect::<Vec<_>>();
        let mut table = table(6);
        table.set_rows(rows(&ids));

        for _ in 0..30 {
            table.scroll_page_down();
            assert!(table.top_row() <= table.selected_row());
            assert!(table.selected_row() < table.top_row() + table.visible_rows());
            assert!(table.top_row() < table.len());
        }
        assert_eq!(table.selected_row(), 49);

        table.scroll_half_page_up();
        assert_eq!(table.selected_row(), 47);

        for _ in 0..30 {
            table.scroll_page_up();
        }
        assert_eq!(table.selected_row(), 0);
        assert_eq!(table.top_row(), 0);
    }

    #[test]
    fn empty_table_tolerates_navigation() {
        let mut table = table(5);
        table.scroll_down();
        table.scroll_page_down();
        table.scroll_bottom();
        assert_eq!(table.selected_row(), 0);
        assert!(table.selected_values().is_empty());
        assert_eq!(table.selected_identity(), None);
    }

    #[test]
    fn elastic_column_absorbs_leftover_width() {
        let mut table = table(5);
        assert_eq!(table.widths(), &[6, 33]);

        table.set_area(Rect::new(0, 0, 12, 5));
        assert_eq!(table.widths(), &[6, 10]);
    }

    #[test]
    fn render_skips_hidden_and_overflowing_columns() {
        let mut table = ScrollTable::new(
            vec![
                Column::hidden("UID"),
                Column::fixed("NAME", 8),
                Column::fixed("WIDE", 30),
            ],
            0,
        )
        .without_location();
        let area = Rect::new(0, 0, 20, 3);
        table.set_area(area);
        table.set_rows(vec![vec![
            "uid-1".to_string(),
            "a-very-long-name".to_string(),
            "wide".to_string(),
        ]]);

        let mut buf = Buffer::empty(area);
        (&table).render(area, &mut buf);

        assert_eq!(line(&buf, 0).trim_end(), "NAME");
        assert_eq!(line(&buf, 1).trim_end(), "a-very-l");
    }

    #[test]
    fn render_shows_location_and_cursor() {
        let mut table = table(3);
        table.set_rows(rows(&["a", "b", "c"]));
        table.scroll_down();
        let area = table.area();

        let mut buf = Buffer::empty(area);
        (&table).render(area, &mut buf);

        assert!(line(&buf, 0).ends_with(" 1 - 2 of 3 "));
        assert!(line(&buf, 2).starts_with("b"));
        assert_eq!(buf[(39, 2)].style().bg, super::CURSOR_STYLE.bg);
        assert_ne!(buf[(39, 1)].style().bg, super::CURSOR_STYLE.bg);
    }
}
