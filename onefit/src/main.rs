use clap::Parser;
use onefit::{Config, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = onefit::config::Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry()?;

    tracing::debug!("{:?}", args);
    tracing::info!(
        server = %config.database.server,
        database = %config.database.name,
        "Bootstrapping database"
    );

    // Any error leaves a non-zero exit status; the host must not start on a partial schema
    if let Err(e) = onefit::init(&config).await {
        if e.is_environmental() {
            tracing::error!(error = %e, "Database bootstrap failed, check the server address, credentials and privileges");
        } else {
            tracing::error!(error = %e, "Database bootstrap failed");
        }
        return Err(e.into());
    }

    Ok(())
}
