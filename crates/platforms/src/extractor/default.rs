use std::time::Duration;

use reqwest::{Client, ClientBuilder};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Client builder preconfigured with the browser User-Agent and an optional
/// per-request timeout.
pub fn create_client_builder(timeout: Option<Duration>) -> ClientBuilder {
    let builder = Client::builder().user_agent(DEFAULT_UA);
    match timeout {
        Some(timeout) if timeout > Duration::ZERO => builder.timeout(timeout),
        _ => builder,
    }
}

pub fn default_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    create_client_builder(Some(timeout)).build()
}
