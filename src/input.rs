use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Top,
    Bottom,
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    GPrefix,
    TogglePause,
    Enter,
    Escape,
    OpenSort,
    OpenNamespaceFilter,
    OpenNodeFilter,
    OpenStateFilter,
    OpenViewList,
    TabNext,
    TabPrev,
}

pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return map_ctrl_key(key.code);
    }

    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('g') if key.modifiers.is_empty() => Some(Action::GPrefix),
        KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::Home => Some(Action::Top),
        KeyCode::End => Some(Action::Bottom),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Char('p') if key.modifiers.is_empty() => Some(Action::TogglePause),
        KeyCode::Char('v') if key.modifiers.is_empty() => Some(Action::OpenViewList),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Esc => Some(Action::Escape),
        KeyCode::F(1) => Some(Action::OpenSort),
        KeyCode::F(2) => Some(Action::OpenNamespaceFilter),
        KeyCode::F(3) => Some(Action::OpenNodeFilter),
        KeyCode::F(4) => Some(Action::OpenStateFilter),
        KeyCode::BackTab => Some(Action::TabPrev),
        KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => Some(Action::TabPrev),
        KeyCode::Tab => Some(Action::TabNext),
        _ => None,
    }
}

fn map_ctrl_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('c') => Some(Action::Quit),
        KeyCode::Char('u') => Some(Action::HalfPageUp),
        KeyCode::Char('d') => Some(Action::HalfPageDown),
        KeyCode::Char('b') => Some(Action::PageUp),
        KeyCode::Char('f') => Some(Action::PageDown),
        _ => None,
    }
}

/// Wheel scrolling moves the cursor one row at a time.
pub fn map_mouse(event: MouseEvent) -> Option<Action> {
    match event.kind {
        MouseEventKind::ScrollUp => Some(Action::Up),
        MouseEventKind::ScrollDown => Some(Action::Down),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key, map_mouse};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

    fn plain(code: KeyCode) -> Option<Action> {
        map_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> Option<Action> {
        map_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    #[test]
    fn quit_keys() {
        assert_eq!(plain(KeyCode::Char('q')), Some(Action::Quit));
        assert_eq!(ctrl('c'), Some(Action::Quit));
        assert_eq!(plain(KeyCode::Char('c')), None);
    }

    #[test]
    fn vim_and_arrow_motion() {
        assert_eq!(plain(KeyCode::Char('k')), Some(Action::Up));
        assert_eq!(plain(KeyCode::Up), Some(Action::Up));
        assert_eq!(plain(KeyCode::Char('j')), Some(Action::Down));
        assert_eq!(plain(KeyCode::Down), Some(Action::Down));
        assert_eq!(plain(KeyCode::Char('g')), Some(Action::GPrefix));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(Action::Bottom)
        );
        assert_eq!(plain(KeyCode::Home), Some(Action::Top));
        assert_eq!(plain(KeyCode::End), Some(Action::Bottom));
    }

    #[test]
    fn ctrl_paging() {
        assert_eq!(ctrl('u'), Some(Action::HalfPageUp));
        assert_eq!(ctrl('d'), Some(Action::HalfPageDown));
        assert_eq!(ctrl('b'), Some(Action::PageUp));
        assert_eq!(ctrl('f'), Some(Action::PageDown));
        assert_eq!(ctrl('j'), None);
    }

    #[test]
    fn function_keys_open_lists() {
        assert_eq!(plain(KeyCode::F(1)), Some(Action::OpenSort));
        assert_eq!(plain(KeyCode::F(2)), Some(Action::OpenNamespaceFilter));
        assert_eq!(plain(KeyCode::F(3)), Some(Action::OpenNodeFilter));
        assert_eq!(plain(KeyCode::F(4)), Some(Action::OpenStateFilter));
        assert_eq!(plain(KeyCode::Char('v')), Some(Action::OpenViewList));
        assert_eq!(plain(KeyCode::F(5)), None);
    }

    #[test]
    fn tab_keys_cycle_containers() {
        assert_eq!(plain(KeyCode::Tab), Some(Action::TabNext));
        assert_eq!(plain(KeyCode::BackTab), Some(Action::TabPrev));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT)),
            Some(Action::TabPrev)
        );
    }

    #[test]
    fn wheel_scrolls_one_row() {
        let wheel = |kind| MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(wheel(MouseEventKind::ScrollUp)), Some(Action::Up));
        assert_eq!(map_mouse(wheel(MouseEventKind::ScrollDown)), Some(Action::Down));
        assert_eq!(map_mouse(wheel(MouseEventKind::Moved)), None);
    }
}
