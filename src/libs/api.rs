pub mod api_traits;
pub mod dto;
pub mod http_client;
