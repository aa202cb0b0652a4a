pub mod frame;
pub mod notices;

pub use frame::*;
pub use notices::*;
