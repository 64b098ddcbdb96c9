pub mod config;
pub mod models;

pub use config::{FetchConfig, FetchOptions, RetryPolicy};
pub use models::{Blob, HttpResponse, RequestBody, RequestOptions, ResponseBody, ResponseType};
