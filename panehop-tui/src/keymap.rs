use panehop_core::{
    action::Action,
    config::{Command, KeysConfig},
    geometry::Direction,
    keyboard::KeyEvent,
    state::AppState,
};

/// Resolve a key event into an Action based on current mode and key bindings
pub fn resolve_action(
    key: crossterm::event::KeyEvent,
    state: &AppState,
    keys: &KeysConfig,
) -> Option<Action> {
    let key = KeyEvent::from(key);
    let keymap = keys.keymap_for_mode(state.mode);

    if let Some(command) = keymap.get(&key) {
        return command_to_action(command);
    }

    // Unbound printable keys type into the query when the policy allows it
    if state.types_to_search()
        && let Some(c) = key.printable_char()
    {
        return Some(Action::SearchPush(c));
    }

    None
}

fn command_to_action(command: &Command) -> Option<Action> {
    let action = match command {
        Command::Noop => return None,
        Command::Quit => Action::Quit,
        Command::QuitConfirm => Action::QuitConfirm,
        Command::Activate => Action::Activate,
        Command::Refresh => Action::Refresh,
        Command::FocusSearch => Action::FocusSearch,
        Command::CancelSearch => Action::CancelSearch,
        Command::LeaveSearch => Action::LeaveSearch,
        Command::MoveUp => Action::MoveSelection(-1),
        Command::MoveDown => Action::MoveSelection(1),
        Command::HalfPageUp => Action::HalfPageUp,
        Command::HalfPageDown => Action::HalfPageDown,
        Command::PageUp => Action::PageUp,
        Command::PageDown => Action::PageDown,
        Command::MoveTop => Action::MoveTop,
        Command::MoveBottom => Action::MoveBottom,
        Command::FocusLeft => Action::FocusPane(Direction::Left),
        Command::FocusDown => Action::FocusPane(Direction::Down),
        Command::FocusUp => Action::FocusPane(Direction::Up),
        Command::FocusRight => Action::FocusPane(Direction::Right),
        Command::DeleteBackwardChar => Action::SearchPop,
        Command::DeleteBackwardWord => Action::SearchDeleteWord,
        Command::MoveCursorLeft => Action::CursorLeft,
        Command::MoveCursorRight => Action::CursorRight,
        Command::MoveCursorStart => Action::CursorStart,
        Command::MoveCursorEnd => Action::CursorEnd,
    };
    Some(action)
}
