use clap::Parser;
use netns_handoff::config::cli::{print_default_config, CliArgs};
use netns_handoff::config::load_configuration;
use netns_handoff::netops::rtnl::RtnlNamespaceOps;
use netns_handoff::runner;
use netns_handoff::AppError;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print_default_config();
        return Ok(());
    }

    let config = load_configuration(&cli)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .init();

    if cli.validate_config {
        info!("Configuration is valid");
        return Ok(());
    }

    info!(namespace = %config.target_namespace, "Starting netns-handoff");

    let ops = RtnlNamespaceOps::new(&config.netns_dir);
    match runner::run(&ops, &config).await {
        Ok(report) => {
            info!(
                interface = %report.classification.secondary,
                namespace = %report.outcome.namespace_path.display(),
                "Handoff complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Handoff failed: {}", e);
            Err(e)
        }
    }
}
