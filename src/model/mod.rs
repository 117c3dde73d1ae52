pub mod config;
pub mod goal;
pub mod options;
pub mod store;

pub use config::*;
pub use goal::*;
pub use options::*;
pub use store::*;
