//! The Howell Bridge daemon library: configuration, auth, the GitHub
//! webhook, the REST surface, background-worker wiring, and the setup
//! glue that assembles them into a running axum server.

pub mod auth;
pub mod config;
pub mod http;
pub mod setup;
pub mod telemetry;
pub mod webhook;
pub mod workers;

pub use config::CliOverrides;
pub use howell_core::Config;
pub use setup::{build_coordinator, build_daemon, Daemon};
pub use telemetry::init_telemetry;
