pub mod auth;
pub mod config;
pub mod graphql;
pub mod http;
pub mod import;
pub mod insights;
pub mod seed;
