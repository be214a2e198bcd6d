//! Response envelopes and header merging.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

use super::placeholder::Placeholder;

/// Content type of plain-text status bodies.
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// The complete result of one gateway request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// HTTP status code
    pub status: StatusCode,

    /// Final header set
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,
}

impl ResponseEnvelope {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A plain-text response such as `"Grid not found"`.
    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE));
        Self::new(status, headers, message.into())
    }

    /// `404` carrying the placeholder image.
    pub fn placeholder(placeholder: &Placeholder) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(Placeholder::CONTENT_TYPE),
        );
        Self::new(StatusCode::NOT_FOUND, headers, placeholder.bytes().clone())
    }

    /// Body as UTF-8 text, for logging and tests.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Merge header sources; later sources win on key collision.
///
/// Precedence is `render` over `defaults` over `cache`. A key present in a
/// later source replaces every value of that key from earlier ones.
pub fn merge_headers(cache: &HeaderMap, defaults: &HeaderMap, render: &HeaderMap) -> HeaderMap {
    let mut merged = HeaderMap::new();
    overlay_headers(&mut merged, cache);
    overlay_headers(&mut merged, defaults);
    overlay_headers(&mut merged, render);
    merged
}

/// Copy `source` onto `target`, replacing keys that already exist.
pub(crate) fn overlay_headers(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
        for value in source.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}
