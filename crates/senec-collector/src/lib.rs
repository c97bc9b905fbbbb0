pub mod config;
pub mod server;
pub mod shutdown;

pub use config::CollectorConfig;
pub use server::ServerState;
