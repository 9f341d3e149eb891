use hemmer_provider_sumologic::{init_logging, serve, SumoLogicProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(SumoLogicProvider::new()).await
}
