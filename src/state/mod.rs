//! Client-side state modules.
//!
//! DESIGN
//! ======
//! State is split by concern (`chat` log, `session`, `ui` form and draft) so
//! the chat layer and the view can depend on small focused models.

pub mod chat;
pub mod session;
pub mod ui;
