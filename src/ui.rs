use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::Block;

use crate::app::App;

pub const BG: Color = Color::Rgb(9, 15, 25);
pub const PANEL: Color = Color::Rgb(16, 27, 44);
pub const ACCENT: Color = Color::Rgb(52, 211, 153);
pub const MUTED: Color = Color::Rgb(140, 156, 178);
pub const WARN: Color = Color::Rgb(251, 191, 36);
pub const ERROR: Color = Color::Rgb(248, 113, 113);
pub const PL_A: Color = Color::Rgb(17, 94, 89);
pub const PL_B: Color = Color::Rgb(30, 64, 175);
pub const PL_C: Color = Color::Rgb(55, 48, 163);
pub const PL_D: Color = Color::Rgb(82, 24, 124);

pub const HEADER_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Green);
pub const CURSOR_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Cyan);

/// Splits the terminal into the view area and the one-row status bar.
pub fn screen_areas(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    app.resize(area);
    let (view_area, status_area) = screen_areas(area);

    frame.render_widget(Block::default().style(Style::default().bg(BG)), area);
    app.view().render(frame, view_area);
    frame.render_widget(app.status_bar(), status_area);

    if app.list().is_visible() {
        app.list().render(frame);
    }
}
