//! WebSocket upgrade handling and credential extraction

use axum::{
    extract::ws::{WebSocket, WebSocketUpgrade as AxumWebSocketUpgrade},
    http::{HeaderMap, header},
    response::Response,
};

/// Read the bearer credential from the `Authorization` header, taken
/// verbatim apart from surrounding whitespace.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Upgrade wrapper carrying the request headers alongside the axum
/// upgrade, so the handshake credential survives into the socket task.
pub struct GatewayUpgrade {
    upgrade: AxumWebSocketUpgrade,
    headers: HeaderMap,
}

impl GatewayUpgrade {
    /// Create a new upgrade from the axum extractors
    pub fn new(upgrade: AxumWebSocketUpgrade, headers: HeaderMap) -> Self {
        Self { upgrade, headers }
    }

    /// Extract the handshake credential, if the request carried one
    pub fn credential(&self) -> Option<String> {
        credential_from_headers(&self.headers)
    }

    /// Get the underlying headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Complete the WebSocket upgrade
    pub fn on_upgrade<F>(self, callback: F) -> Response
    where
        F: FnOnce(WebSocket) -> futures::future::BoxFuture<'static, ()> + Send + 'static,
    {
        self.upgrade.on_upgrade(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_trimmed_but_otherwise_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "  some.jwt.token  ".parse().unwrap());
        assert_eq!(
            credential_from_headers(&headers),
            Some("some.jwt.token".to_string())
        );

        // No Bearer-prefix stripping: the value is passed through as-is.
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(
            credential_from_headers(&headers),
            Some("Bearer abc123".to_string())
        );
    }

    #[test]
    fn missing_or_blank_credential_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(credential_from_headers(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "   ".parse().unwrap());
        assert_eq!(credential_from_headers(&headers), None);
    }
}
