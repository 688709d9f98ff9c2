use crate::geometry::Direction;

/// Every user interaction produces an Action. UI never directly calls tmux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Lifecycle
    Quit,
    QuitConfirm,
    Activate,
    Refresh,

    // Search mode
    FocusSearch,
    CancelSearch,
    LeaveSearch,
    SearchPush(char),
    SearchPop,
    SearchDeleteWord,

    // Movement
    MoveSelection(i32),
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    MoveTop,
    MoveBottom,

    // Pane focus by geometry
    FocusPane(Direction),

    // Cursor movement (for search input)
    CursorLeft,
    CursorRight,
    CursorStart,
    CursorEnd,
}
