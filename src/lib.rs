pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod id;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod ratelimit;
pub mod redis;
pub mod server;
pub mod service;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{build_state, build_state_with_clock, create_app, Server};
