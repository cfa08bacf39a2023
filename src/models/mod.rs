pub mod enums;
pub mod measurement;
pub mod visit;

pub use enums::*;
pub use measurement::*;
pub use visit::*;
