pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod infra;
pub mod logging;
pub mod model;
pub mod repository;
pub mod server;
pub mod service;
pub mod stats;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use model::*;
pub use server::StatsServer;
pub use service::{Access, StatsService};
