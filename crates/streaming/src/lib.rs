pub mod gateway;
pub mod load;
pub mod protocol;
pub mod request;

pub use gateway::*;
pub use load::*;
pub use protocol::*;
pub use request::*;
