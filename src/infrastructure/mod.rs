// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_directory;
pub mod wire;
pub mod ws_connector;
