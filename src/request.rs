//! Transport request view and test request builder

use std::fmt::Display;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, Uri};
use url::form_urlencoded;

/// Borrowed parts of an HTTP request that decoding needs.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

impl RequestView<'_> {
    /// Raw `Content-Type` header, empty when absent or not visible ASCII.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or_default()
    }
}

impl<'a, B: AsRef<[u8]>> From<&'a Request<B>> for RequestView<'a> {
    fn from(req: &'a Request<B>) -> Self {
        Self {
            method: req.method(),
            uri: req.uri(),
            headers: req.headers(),
            body: req.body().as_ref(),
        }
    }
}

/// Build a URL-encoded `POST` request carrying `form`.
///
/// Pairs are sorted by key; values use their `Display` text.
pub fn new_form_request<I, K, V>(uri: &str, form: I) -> Result<Request<Bytes>, http::Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let mut pairs: Vec<(String, String)> = form
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.to_string()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();

    Request::post(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(CONTENT_LENGTH, body.len())
        .body(Bytes::from(body))
}
