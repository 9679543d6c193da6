//! Pingboard service: endpoint configuration, the probing engine, and the
//! statistics the dashboard reads.

pub mod aggregation;
pub mod config;
pub mod database;
pub mod endpoints;
pub mod monitoring;
pub mod pool;
pub mod query;
pub mod validation;

pub use config::Config;
pub use endpoints::{EndpointService, ServiceError};
