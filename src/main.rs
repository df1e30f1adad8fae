use clap::Parser;
use tracing::{debug, Level};

use deep_researcher::commands::Cli;
use deep_researcher::config::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load env
    let _ = dotenv::dotenv();
    let config = PipelineConfig::from_env();
    debug!(
        llm = %config.llm_base_url,
        model = %config.llm_model,
        search = %config.search_url,
        "Configuration loaded"
    );

    cli.execute(&config).await
}
