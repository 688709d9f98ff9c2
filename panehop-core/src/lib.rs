pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod geometry;
pub mod host;
pub mod keyboard;
pub mod model;
pub mod state;
pub mod tree;

// Re-export commonly used types at crate root
pub use action::Action;
pub use config::Config;
pub use error::HostError;
pub use event::AppEvent;
pub use filter::{FilterEngine, FilterOptions, MatcherKind};
pub use geometry::Direction;
pub use host::{CliTmuxBridge, HostBridge, HostEvent, Subscription};
pub use keyboard::KeyEvent;
pub use model::{PaneRect, Session, SessionId, Tab, TabId, TreeSnapshot, Window, WindowId};
pub use state::{AppState, Mode};
pub use tree::{ApplyOutcome, EntityRef, Row, SessionTreeStore, TreeUpdate};
