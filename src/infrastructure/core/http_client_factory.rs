use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates a new HTTP client with retry middleware
    pub fn create_client(timeout: Duration, max_retries: u32) -> ClientWithMiddleware {
        // Exponential backoff on transient failures (connect errors, 5xx, 429)
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Append query parameters to `base_url`.
///
/// reqwest-middleware's request builder has no `.query()`, so the query
/// string is assembled here.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query_string: String = params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                encode_component(k.as_ref()),
                encode_component(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    if base_url.contains('?') {
        format!("{}&{}", base_url, query_string)
    } else {
        format!("{}?{}", base_url, query_string)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn encode_component(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_appended() {
        let url =
            build_url_with_query("http://localhost:8000/api/model/roc", &[("model", "xgboost")]);
        assert_eq!(url, "http://localhost:8000/api/model/roc?model=xgboost");

        let url = build_url_with_query("http://h/x?a=1", &[("model", "tensorflow")]);
        assert_eq!(url, "http://h/x?a=1&model=tensorflow");

        let empty: [(&str, &str); 0] = [];
        assert_eq!(build_url_with_query("http://h/x", &empty), "http://h/x");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(encode_component("TXN-00042"), "TXN-00042");
        assert_eq!(encode_component("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_component("é"), "%C3%A9");
    }
}
