// Infrastructure layer - Upstream API client, stream decoding and HTTP plumbing
pub mod config;
pub mod frame_decoder;
pub mod http_client;
pub mod ndjson_response;
