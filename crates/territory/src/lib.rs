pub mod assign;
pub mod editor;
pub mod error;
pub mod panel;
pub mod polygon;
pub mod session;
pub mod stats;
pub mod store;

pub use assign::*;
pub use editor::*;
pub use error::*;
pub use panel::*;
pub use polygon::*;
pub use session::*;
pub use stats::*;
pub use store::*;
