pub mod checkpoint;
pub mod research;

pub use checkpoint::*;
pub use research::*;
