pub mod batch;
pub mod counter;
pub mod error;
pub mod field;
pub mod ids;
pub mod model;
pub mod record;
pub mod thread;

pub use batch::*;
pub use counter::*;
pub use error::*;
pub use field::*;
pub use ids::*;
pub use model::*;
pub use record::*;
pub use thread::*;
