pub mod layer;
pub mod lod;
pub mod map;
pub mod markers;
pub mod symbology;
pub mod viewport;

pub use layer::*;
pub use viewport::*;
