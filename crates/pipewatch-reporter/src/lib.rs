pub mod config;
pub mod reporter;
pub mod snapshot;

pub use config::*;
pub use reporter::*;
pub use snapshot::*;
