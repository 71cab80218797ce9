use research_pipeline::{
    claims::open_claim_store,
    config::Config,
    llm::GroqBackendFactory,
    pipeline::PipelineOrchestrator,
    report::format_report,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_QUERY: &str = "Compare Next.js and SvelteKit for server-side rendering";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let query = if args.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        args.join(" ")
    };

    let config = Config::from_env()?;
    info!(models = ?config.candidate_models, "Research pipeline starting");

    let store = open_claim_store(&config.database_url).await;
    let factory = Arc::new(GroqBackendFactory::new(
        config.groq_api_key.clone(),
        config.groq_base_url.clone(),
    ));

    let pipeline = PipelineOrchestrator::connect(&config, factory, store).await?;

    match pipeline.run(&query).await {
        Ok(output) => {
            info!(run_id = %output.run_id, elapsed_ms = output.execution_time_ms, "Pipeline finished");
            println!("{}", format_report(&output));
            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
