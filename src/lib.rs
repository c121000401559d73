pub mod api;
pub mod config;
pub mod error;
pub mod provider;
pub mod report;
pub mod state;
