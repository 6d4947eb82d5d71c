use incident_ledger::config::{PipelineConfig, load_system_prompt};
use incident_ledger::context::PipelineContext;
use incident_ledger::llm::{LlmConfig, create_provider};
use incident_ledger::store::{Ledger, SeenSet};
use incident_ledger::watcher::Watcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PipelineConfig::from_env()?;
    let llm_config = LlmConfig::from_env()?;

    eprintln!("📋 Incident Ledger v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Table: {}", config.table_path.display());
    eprintln!("   Rejects: {}", config.rejects_dir.display());

    // ── Directories ─────────────────────────────────────────────────────
    std::fs::create_dir_all(&config.watch_dir)?;
    std::fs::create_dir_all(&config.rejects_dir)?;
    if let Some(parent) = config.table_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // ── Pipeline ────────────────────────────────────────────────────────
    let llm = create_provider(&llm_config)?;
    let system_prompt = load_system_prompt(&config.system_prompt_path)?;
    let context = PipelineContext::new(llm, config.retry, system_prompt);

    // ── Ledger ──────────────────────────────────────────────────────────
    let ledger = Ledger::open(&config.table_path)?;
    let seen = SeenSet::load(&config.seen_path)?;
    eprintln!("   Rows: {} committed, {} documents seen", ledger.len(), seen.len());

    eprintln!(
        "\nwatching {} every {}s... (Ctrl+C to stop)",
        config.watch_dir.display(),
        config.poll_interval.as_secs()
    );

    let mut watcher = Watcher::new(&config, context, ledger, seen);
    watcher.run().await?;

    Ok(())
}
