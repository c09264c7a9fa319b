pub mod game;
pub mod selection;

pub use game::*;
pub use selection::*;
