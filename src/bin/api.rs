use research_pipeline::{
    api::start_server,
    audit::AuditLog,
    claims::open_claim_store,
    config::{api_port, Config},
    llm::GroqBackendFactory,
    pipeline::PipelineOrchestrator,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Fails fast on missing credentials
    let config = Config::from_env()?;
    let port = api_port()?;

    info!("Research Pipeline - API Server");
    info!("Port: {}", port);

    let store = open_claim_store(&config.database_url).await;
    let factory = Arc::new(GroqBackendFactory::new(
        config.groq_api_key.clone(),
        config.groq_base_url.clone(),
    ));

    let pipeline = Arc::new(PipelineOrchestrator::connect(&config, factory, store).await?);
    info!("Pipeline initialized");

    start_server(pipeline, Arc::new(AuditLog::new()), port).await?;

    Ok(())
}
