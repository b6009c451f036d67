//! Field health monitoring client: loads fields from the analytics backend,
//! runs race-free analysis/trend requests for the live selection and feeds the
//! results to the map, metrics and trend views.

pub mod bus;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod filters;
pub mod models;
pub mod monitor;
pub mod registry;
pub mod session;
pub mod ui;
pub mod views;

pub use client::{FieldBackend, FieldClient};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::FieldMonitor;
pub use session::SessionStore;
