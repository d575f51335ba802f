pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod vault;
