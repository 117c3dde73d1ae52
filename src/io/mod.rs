pub mod config_io;
pub mod options_io;
pub mod recovery;
pub mod store_io;
