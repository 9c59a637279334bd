mod handler;
mod model;

pub use handler::{clear_cache, create_api_key, delete_api_key, list_api_keys, toggle_api_key};
pub use model::{ClearCacheResponse, CreateApiKeyRequest, IdQuery, MessageResponse};
