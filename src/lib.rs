pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod store;
