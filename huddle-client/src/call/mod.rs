mod event;
mod manager;

pub use event::CallEvent;
pub use manager::{CallSession, MediaStack};
