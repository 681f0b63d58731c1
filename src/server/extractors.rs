//! Content negotiation for the HTTP server.
//!
//! Bodies are JSON unless the client says otherwise: requests whose
//! `Content-Type` mentions msgpack are decoded as `MessagePack`, and
//! responses are encoded as `MessagePack` when `Accept` asks for it.

use std::convert::Infallible;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

const MSGPACK: &str = "application/msgpack";

fn mentions_msgpack(headers: &HeaderMap, name: axum::http::HeaderName) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("msgpack"))
}

/// Response encoding chosen from the `Accept` header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    #[default]
    Json,
    MsgPack,
}

impl WireFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if mentions_msgpack(headers, ACCEPT) {
            Self::MsgPack
        } else {
            Self::Json
        }
    }

    /// Wrap a body for this format
    pub fn respond<T: Serialize>(self, body: T) -> Negotiated<T> {
        Negotiated { format: self, body }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for WireFormat
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// A response body encoded per [`WireFormat`]
pub struct Negotiated<T> {
    pub format: WireFormat,
    pub body: T,
}

impl<T: Serialize> IntoResponse for Negotiated<T> {
    fn into_response(self) -> Response {
        match self.format {
            WireFormat::Json => Json(self.body).into_response(),
            WireFormat::MsgPack => match rmp_serde::to_vec_named(&self.body) {
                Ok(bytes) => (StatusCode::OK, [(CONTENT_TYPE, MSGPACK)], bytes).into_response(),
                Err(e) => AppError::Internal(format!("Failed to serialize response: {e}"))
                    .into_response(),
            },
        }
    }
}

/// Request body decoded from JSON or `MessagePack` by content type.
///
/// Accepts `application/msgpack` and `application/x-msgpack`; anything else,
/// including a missing content type, is read as JSON.
pub struct ApiBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_msgpack = mentions_msgpack(req.headers(), CONTENT_TYPE);

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {e}")))?;

        let decoded = if is_msgpack {
            rmp_serde::from_slice(&bytes)
                .map_err(|e| AppError::BadRequest(format!("Invalid MessagePack body: {e}")))?
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
        };
        Ok(ApiBody(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        k: usize,
    }

    #[test]
    fn test_wire_format_from_accept() {
        let mut headers = HeaderMap::new();
        assert_eq!(WireFormat::from_headers(&headers), WireFormat::Json);

        headers.insert(ACCEPT, HeaderValue::from_static("application/x-msgpack"));
        assert_eq!(WireFormat::from_headers(&headers), WireFormat::MsgPack);

        headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));
        assert_eq!(WireFormat::from_headers(&headers), WireFormat::Json);
    }

    #[tokio::test]
    async fn test_api_body_decodes_msgpack() {
        let payload = Payload {
            name: "muse".to_string(),
            k: 3,
        };
        let req = Request::builder()
            .header(CONTENT_TYPE, MSGPACK)
            .body(axum::body::Body::from(rmp_serde::to_vec_named(&payload).unwrap()))
            .unwrap();

        let ApiBody(decoded) = ApiBody::<Payload>::from_request(req, &()).await.unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_api_body_rejects_bad_json() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let err = ApiBody::<Payload>::from_request(req, &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_msgpack_response_content_type() {
        let response = WireFormat::MsgPack
            .respond(Payload {
                name: "a".to_string(),
                k: 1,
            })
            .into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], MSGPACK);
    }
}
