pub mod app;
pub mod config;

pub use app::{run, Gatekeeper};
pub use config::{ServerArgs, ServerConfig};
