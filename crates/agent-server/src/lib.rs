pub mod config;
pub mod connection;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;
pub mod writer;

pub use config::GatewayConfig;
pub use server::{app_config, run_server};
pub use state::AppState;
