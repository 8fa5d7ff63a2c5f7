pub mod contract;
pub mod memory;
pub mod traits;

pub use contract::*;
pub use memory::*;
pub use traits::*;
