//! stagepipe demo - Main Entry Point
//!
//! Squares then increments a fixed pair of numbers through a cancellable
//! pipeline, prints every value that made it through, then prints the stage
//! reports as JSON. An optional first argument names a `.toml`/`.json`
//! pipeline config file.

use anyhow::Context;
use stagepipe_rs::{CancelToken, PipelineBuilder, PipelineConfig, Value};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Delay before the demo fires its cancellation token.
const CANCEL_AFTER: Duration = Duration::from_millis(1);

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stagepipe_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading pipeline config from {}", path);
            PipelineConfig::load(&path).with_context(|| format!("loading {}", path))?
        }
        None => PipelineConfig::default(),
    };

    let cancel = CancelToken::new();
    let pipeline = PipelineBuilder::with_config(config)
        .cancel_with(&cancel)
        .stage("square", |x: Value| x * x)
        .stage("increment", |x: Value| x + 1)
        .build_from_values(vec![2, 3])
        .context("building pipeline")?;

    let canceller = cancel.clone();
    let timer = std::thread::Builder::new()
        .name("stagepipe-cancel-timer".to_string())
        .spawn(move || {
            std::thread::sleep(CANCEL_AFTER);
            canceller.fire();
        })
        .context("spawning cancel timer")?;

    for value in pipeline.output().iter() {
        println!("{}", value);
    }

    let reports = pipeline.join().context("joining pipeline stages")?;
    if timer.join().is_err() {
        tracing::warn!("Cancel timer thread panicked");
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
