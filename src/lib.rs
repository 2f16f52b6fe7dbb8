// Export modules for use in tests
pub mod edits;
pub mod event_source;
pub mod geom;
pub mod main_app;
pub mod notification;
pub mod panic_handler;
pub mod pdf;
pub mod session;
pub mod widget;

// Re-export main app components
pub use main_app::{run_app, App, AppAction};
pub use session::{EditSession, InteractionMode};
