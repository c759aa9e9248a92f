use crate::infra::api::State;

pub(in crate::infra::api) fn health(router: axum::Router<State>) -> axum::Router<State> {
    router.route("/health", axum::routing::get(route))
}

async fn route() -> &'static str {
    "OK"
}
