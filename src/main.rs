use anyhow::Result;
use hotword_engine::config::Config;
use hotword_engine::source::FileSource;
use hotword_engine::{telemetry, watch, HotwordEngine};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    tracing::info!("hotword-engine starting");

    let engine = Arc::new(HotwordEngine::new(config.engine.clone()));
    let limits = engine.config();
    tracing::info!(
        max_text_chars = limits.max_text_chars,
        total_budget_ms = limits.total_budget_ms,
        pattern_timeout_ms = limits.pattern_timeout_ms,
        max_replacements_per_key = limits.max_replacements_per_key,
        max_pending_workers = limits.max_pending_workers,
        "engine limits"
    );
    let source = Arc::new(FileSource::from_config(&config)?);

    for (category, result) in engine.load_from_source(&*source) {
        match result {
            Ok(summary) => tracing::info!(
                category = %category,
                loaded = summary.loaded,
                skipped = summary.skipped.len(),
                "dictionary loaded"
            ),
            Err(e) => tracing::error!(category = %category, "dictionary not loaded: {}", e),
        }
    }

    let watcher = config.watch.enabled.then(|| {
        tokio::spawn(watch::watch(
            Arc::clone(&engine),
            Arc::clone(&source),
            config.watch.clone(),
        ))
    });

    // Filter stdin line by line until EOF or Ctrl+C
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let engine = Arc::clone(&engine);
                let output = tokio::task::spawn_blocking(move || engine.process_text(&line)).await?;
                stdout.write_all(output.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
    }

    if let Some(task) = watcher {
        task.abort();
    }

    let stats = engine.statistics();
    tracing::info!(
        entries = stats.total_entries,
        replacements = stats.total_replacements,
        "hotword-engine stopped"
    );

    Ok(())
}
