#[tokio::main]
async fn main() {
    supply_api::start(std::env::args()).await;
}
