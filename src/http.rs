//! Blocking HTTP plumbing shared by the site backends.
//!
//! Every request goes through [`send`], which turns network failures and
//! non-success statuses into [`NoteCopyError`]s tagged with the method and
//! URL. The `url` argument never carries credentials; those travel as query
//! parameters, form fields or cookies added to the request builder, so the
//! wrapped `reqwest::Error` is stripped of its URL before it is kept.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::cookie::Jar;

use crate::config::HttpConfig;
use crate::error::{NoteCopyError, Result};

/// Build the client used for all site traffic.
pub fn build_client(http: &HttpConfig) -> Result<Client> {
    client_builder(http)
        .build()
        .map_err(|e| NoteCopyError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

/// Build a client that records every cookie it receives in `jar`.
pub fn cookie_client(http: &HttpConfig, jar: Arc<Jar>) -> Result<Client> {
    client_builder(http)
        .cookie_provider(jar)
        .build()
        .map_err(|e| NoteCopyError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

fn client_builder(http: &HttpConfig) -> reqwest::blocking::ClientBuilder {
    Client::builder()
        .timeout(http.timeout())
        .user_agent(http.user_agent.clone())
}

/// Send a request and require a 2xx response.
pub fn send(request: RequestBuilder, method: &'static str, url: &str) -> Result<Response> {
    tracing::debug!(method, url, "sending request");
    let response = request.send().map_err(|source| NoteCopyError::Transport {
        method,
        url: url.to_string(),
        source: source.without_url(),
    })?;

    let status = response.status();
    tracing::debug!(method, url, status = status.as_u16(), "received response");
    if !status.is_success() {
        return Err(NoteCopyError::Status {
            method,
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}

/// Read a response body as text.
pub fn read_text(response: Response, method: &'static str, url: &str) -> Result<String> {
    response.text().map_err(|source| NoteCopyError::Transport {
        method,
        url: url.to_string(),
        source: source.without_url(),
    })
}

/// Read a response body as JSON. A body that is not JSON is a parse error.
pub fn read_json(response: Response, method: &'static str, url: &str) -> Result<serde_json::Value> {
    let body = read_text(response, method, url)?;
    serde_json::from_str(&body).map_err(|e| NoteCopyError::parse(format!("JSON from {}", url), e))
}

/// Render cookies as a `Cookie` header value: `a=1; b=2`.
pub fn cookie_header<'a, I>(cookies: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cookies
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a `Cookie` header value back into name/value pairs.
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_pairs() {
        assert_eq!(
            cookie_header([("user_id", "42"), ("pass_hash", "abc")]),
            "user_id=42; pass_hash=abc"
        );
        assert_eq!(cookie_header(Vec::<(&str, &str)>::new()), "");
    }

    #[test]
    fn transport_error_hides_query_parameters() {
        // Nothing listens on a port freed right after binding it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{}/posts/1.json", port);
        let client = build_client(&HttpConfig::default()).unwrap();
        let request = client
            .get(&url)
            .query(&[("login", "alice"), ("api_key", "SECRETKEY")]);

        let err = send(request, "GET", &url).unwrap_err();
        assert!(matches!(err, NoteCopyError::Transport { .. }));
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        assert!(message.contains(&url));
        assert!(!message.contains("SECRETKEY"));
        assert!(!message.contains("api_key"));
    }

    #[test]
    fn parse_cookie_header_splits_pairs() {
        let cookies = parse_cookie_header("user_id=42; pass_hash=a=b ;junk; =x");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["user_id"], "42");
        assert_eq!(cookies["pass_hash"], "a=b");
    }
}
