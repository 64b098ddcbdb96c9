pub mod backoff;
pub mod urls;
