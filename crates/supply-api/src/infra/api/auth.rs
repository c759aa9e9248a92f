//! API key gate in front of the price endpoints.

use {
    super::error::Kind,
    crate::infra::{config::Environment, observe},
    axum::{
        Json,
        extract::Request,
        http::{HeaderMap, StatusCode},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    std::sync::Arc,
    subtle::ConstantTimeEq,
};

/// Header carrying the API key.
pub const HEADER: &str = "x-api-key";

#[derive(Clone, Debug)]
pub enum Gate {
    /// Every request passes.
    Open,
    /// Requests must carry the key in the [`HEADER`] header.
    Key(Arc<str>),
}

impl Gate {
    pub fn new(environment: Environment, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|key| !key.is_empty());
        match (environment, api_key) {
            (Environment::Development, _) => {
                observe::auth_bypassed();
                Self::Open
            }
            (Environment::Production, None) => {
                observe::auth_disabled();
                Self::Open
            }
            (Environment::Production, Some(key)) => Self::Key(key.into()),
        }
    }

    fn allows(&self, headers: &HeaderMap) -> bool {
        match self {
            Self::Open => true,
            Self::Key(key) => headers
                .get(HEADER)
                .is_some_and(|value| value.as_bytes().ct_eq(key.as_bytes()).into()),
        }
    }
}

/// Rejects requests the gate doesn't allow before they reach any handler.
pub(super) async fn require_api_key(
    gate: axum::extract::State<Gate>,
    request: Request,
    next: Next,
) -> Response {
    if gate.allows(request.headers()) {
        return next.run(request).await;
    }
    observe::unauthorized(request.uri().path());
    <(StatusCode, Json<super::Error>)>::from(Kind::Unauthorized).into_response()
}

#[cfg(test)]
mod tests {
    use {super::*, axum::http::HeaderValue};

    fn headers(key: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = key {
            headers.insert(HEADER, HeaderValue::from_static(key));
        }
        headers
    }

    #[test]
    fn production_requires_matching_key() {
        let gate = Gate::new(Environment::Production, Some("secret".to_string()));
        assert!(gate.allows(&headers(Some("secret"))));
        assert!(!gate.allows(&headers(Some("wrong"))));
        assert!(!gate.allows(&headers(None)));
    }

    #[test]
    fn rejects_keys_sharing_a_prefix() {
        let gate = Gate::new(Environment::Production, Some("secret".to_string()));
        assert!(!gate.allows(&headers(Some("secre"))));
        assert!(!gate.allows(&headers(Some("secret2"))));
        assert!(!gate.allows(&headers(Some(""))));
    }

    #[test]
    fn development_bypasses_the_key() {
        let gate = Gate::new(Environment::Development, Some("secret".to_string()));
        assert!(gate.allows(&headers(None)));
    }

    #[test]
    fn missing_key_opens_the_gate() {
        assert!(Gate::new(Environment::Production, None).allows(&headers(None)));
        assert!(Gate::new(Environment::Production, Some(String::new())).allows(&headers(None)));
    }
}
