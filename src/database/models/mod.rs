pub mod api_key;
pub mod request_log;

pub use api_key::{ApiKey, NewApiKey};
pub use request_log::RequestLog;
