// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod http_response;
pub mod http_source;
pub mod socket_io;
pub mod view_mapper;
pub mod wire;
