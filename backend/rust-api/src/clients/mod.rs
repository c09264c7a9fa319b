//! REST implementations of the engine's content and result ports.

pub mod content;
pub mod results;

pub use content::{ContentRecord, RestContentClient};
pub use results::RestResultClient;
