use {
    crate::domain::price::LookupError,
    axum::{Json, http::StatusCode},
    serde::Serialize,
};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) enum Kind {
    UnsupportedSymbol,
    PriceUnavailable,
    Unauthorized,
    RateLimited,
    UpstreamUnavailable,
}

impl Kind {
    fn status(self) -> StatusCode {
        match self {
            Self::UnsupportedSymbol => StatusCode::BAD_REQUEST,
            Self::PriceUnavailable => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::UnsupportedSymbol => "Unsupported token symbol",
            Self::PriceUnavailable => "No price available for the token",
            Self::Unauthorized => "Missing or invalid API key",
            Self::RateLimited => "Too many requests, please try again later",
            Self::UpstreamUnavailable => "Upstream data is currently unavailable",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    kind: Kind,
    description: String,
}

impl From<Kind> for (StatusCode, Json<Error>) {
    fn from(kind: Kind) -> Self {
        (
            kind.status(),
            Json(Error {
                kind,
                description: kind.description().to_owned(),
            }),
        )
    }
}

impl From<LookupError> for (StatusCode, Json<Error>) {
    fn from(err: LookupError) -> Self {
        let (kind, description) = match err {
            LookupError::Unsupported { symbol, supported } => {
                let supported = supported
                    .iter()
                    .map(|symbol| symbol.as_str())
                    .collect::<Vec<_>>();
                (
                    Kind::UnsupportedSymbol,
                    format!(
                        "Unsupported token symbol {symbol}, supported symbols are {}",
                        supported.join(", ")
                    ),
                )
            }
            LookupError::NotQuoted(symbol) => (
                Kind::PriceUnavailable,
                format!("No price available for {symbol}"),
            ),
            LookupError::Upstream(_) => return Kind::UpstreamUnavailable.into(),
        };
        (kind.status(), Json(Error { kind, description }))
    }
}
