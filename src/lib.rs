pub mod common;
pub mod server;
