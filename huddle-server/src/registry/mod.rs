mod command;
mod handle;
pub mod presence;
mod registry;
mod room;

pub use command::*;
pub use handle::*;
pub use registry::*;
pub use room::*;
