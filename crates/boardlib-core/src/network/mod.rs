//! Network utilities: HTTP client, retries and verified downloads.

mod client;
mod download;
mod retry;

pub use client::HttpClient;
pub use download::{hash_file, verify_file, Checksum, Downloader, Integrity};
pub use retry::{retry_async, RetryConfig};
