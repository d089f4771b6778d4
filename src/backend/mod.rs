pub mod app_config;
pub mod cached_client;
pub mod catalog;
pub mod client;
pub mod resources;
pub mod types;
