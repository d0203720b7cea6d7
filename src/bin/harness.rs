use anyhow::Context;
use resp_parity::{Config, Harness};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("invalid configuration")?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let report = Harness::new(config)
        .run()
        .await
        .context("harness run failed")?;
    print!("{report}");

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
