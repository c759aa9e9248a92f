use {
    super::{CACHE_CONTROL, updated_at},
    crate::{
        domain::SupplyRecord,
        infra::{
            api::{Error, State, error::Kind},
            observe,
        },
    },
    axum::{Json, http::StatusCode, response::IntoResponse},
    freshness_cache::Cached,
    number::units,
    serde::Serialize,
};

pub(in crate::infra::api) fn supply(router: axum::Router<State>) -> axum::Router<State> {
    router
        .route("/total", axum::routing::get(total))
        .route("/circulating", axum::routing::get(circulating))
        .route("/supply", axum::routing::get(route))
}

#[derive(Debug, Serialize)]
struct Supply {
    total: f64,
    circulating: f64,
    decimals: u8,
    updated_at: String,
}

async fn current(state: &State) -> Result<Cached<SupplyRecord>, (StatusCode, Json<Error>)> {
    state
        .supply()
        .get()
        .await
        .map_err(|err| {
            observe::upstream_unavailable("supply", &err);
            Kind::UpstreamUnavailable.into()
        })
}

async fn total(
    state: axum::extract::State<State>,
) -> Result<impl IntoResponse, (StatusCode, Json<Error>)> {
    let record = current(&state).await?;
    Ok((
        [CACHE_CONTROL],
        units::to_plain_string(&record.value.total_supply),
    ))
}

async fn circulating(
    state: axum::extract::State<State>,
) -> Result<impl IntoResponse, (StatusCode, Json<Error>)> {
    let record = current(&state).await?;
    Ok((
        [CACHE_CONTROL],
        units::to_plain_string(&record.value.circulating_supply),
    ))
}

async fn route(
    state: axum::extract::State<State>,
) -> Result<impl IntoResponse, (StatusCode, Json<Error>)> {
    let record = current(&state).await?;
    let record = &record.value;
    Ok((
        [CACHE_CONTROL],
        Json(Supply {
            total: units::to_f64_lossy(&record.total_supply),
            circulating: units::to_f64_lossy(&record.circulating_supply),
            decimals: record.decimals,
            updated_at: updated_at(record.computed_at),
        }),
    ))
}
