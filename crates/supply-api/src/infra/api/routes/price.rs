use {
    super::{CACHE_CONTROL, updated_at},
    crate::{
        domain::price::LookupError,
        infra::{
            api::{Error, State, error::Kind},
            observe,
        },
    },
    axum::{Json, extract::Path, http::StatusCode, response::IntoResponse},
    number::units,
    serde::Serialize,
    std::collections::BTreeMap,
};

pub(in crate::infra::api) fn prices(router: axum::Router<State>) -> axum::Router<State> {
    router
        .route("/price/{symbol}", axum::routing::get(price))
        .route("/prices", axum::routing::get(route))
}

#[derive(Debug, Serialize)]
struct Prices {
    prices: BTreeMap<String, f64>,
    updated_at: String,
}

async fn price(
    state: axum::extract::State<State>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<Error>)> {
    let quote = state.prices().price(&symbol).await.inspect_err(|err| {
        if let LookupError::Upstream(err) = err {
            observe::upstream_unavailable("price", err);
        }
    })?;
    Ok(([CACHE_CONTROL], units::to_plain_string(&quote.price)))
}

async fn route(
    state: axum::extract::State<State>,
) -> Result<impl IntoResponse, (StatusCode, Json<Error>)> {
    let record = state
        .prices()
        .all()
        .await
        .map_err(|err| -> (StatusCode, Json<Error>) {
            observe::upstream_unavailable("prices", &err);
            Kind::UpstreamUnavailable.into()
        })?;
    let prices = record
        .prices
        .iter()
        .map(|(symbol, price)| (symbol.to_string(), units::to_f64_lossy(price)))
        .collect();
    Ok((
        [CACHE_CONTROL],
        Json(Prices {
            prices,
            updated_at: updated_at(record.computed_at),
        }),
    ))
}
