use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use std::time::Duration;

/// Arrow keys rotate as if the pointer had been dragged this many rows.
const KEY_ROTATE_ROWS: f32 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Action {
    Quit,
    Notify,
    Rotate { dx: f32, dy: f32 },
    Hover { col: u16, row: u16 },
    Press { col: u16, row: u16 },
    Drag { col: u16, row: u16 },
    Release,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<Action>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Some(action) = map_event(event::read()?) {
            out.push(action);
            if out.len() >= 64 {
                break;
            }
        }
    }
    Ok(out)
}

pub(crate) fn map_event(ev: Event) -> Option<Action> {
    match ev {
        Event::Key(k) => map_key(k),
        Event::Mouse(m) => map_mouse(m),
        _ => None,
    }
}

fn map_key(k: KeyEvent) -> Option<Action> {
    if k.kind != KeyEventKind::Press && k.kind != KeyEventKind::Repeat {
        return None;
    }
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    match k.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Enter | KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::Notify),
        KeyCode::Left => Some(Action::Rotate {
            dx: -KEY_ROTATE_ROWS,
            dy: 0.0,
        }),
        KeyCode::Right => Some(Action::Rotate {
            dx: KEY_ROTATE_ROWS,
            dy: 0.0,
        }),
        KeyCode::Up => Some(Action::Rotate {
            dx: 0.0,
            dy: -KEY_ROTATE_ROWS,
        }),
        KeyCode::Down => Some(Action::Rotate {
            dx: 0.0,
            dy: KEY_ROTATE_ROWS,
        }),
        _ => None,
    }
}

fn map_mouse(m: MouseEvent) -> Option<Action> {
    let (col, row) = (m.column, m.row);
    match m.kind {
        MouseEventKind::Moved => Some(Action::Hover { col, row }),
        MouseEventKind::Down(MouseButton::Left) => Some(Action::Press { col, row }),
        MouseEventKind::Drag(MouseButton::Left) => Some(Action::Drag { col, row }),
        MouseEventKind::Up(MouseButton::Left) => Some(Action::Release),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 7,
            row: 3,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn quit_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc] {
            assert_eq!(map_event(key(code, KeyModifiers::NONE)), Some(Action::Quit));
        }
        assert_eq!(
            map_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(map_event(key(KeyCode::Char('c'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn notify_and_rotate_keys() {
        assert_eq!(
            map_event(key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Notify)
        );
        assert_eq!(
            map_event(key(KeyCode::Char('n'), KeyModifiers::NONE)),
            Some(Action::Notify)
        );
        assert!(matches!(
            map_event(key(KeyCode::Left, KeyModifiers::NONE)),
            Some(Action::Rotate { dx, dy }) if dx < 0.0 && dy == 0.0
        ));
    }

    #[test]
    fn releases_are_ignored_for_keys() {
        let ev = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(map_event(ev), None);
    }

    #[test]
    fn mouse_events() {
        assert_eq!(
            map_event(mouse(MouseEventKind::Moved)),
            Some(Action::Hover { col: 7, row: 3 })
        );
        assert_eq!(
            map_event(mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(Action::Press { col: 7, row: 3 })
        );
        assert_eq!(
            map_event(mouse(MouseEventKind::Drag(MouseButton::Left))),
            Some(Action::Drag { col: 7, row: 3 })
        );
        assert_eq!(
            map_event(mouse(MouseEventKind::Up(MouseButton::Left))),
            Some(Action::Release)
        );
        assert_eq!(map_event(mouse(MouseEventKind::ScrollDown)), None);
    }
}
