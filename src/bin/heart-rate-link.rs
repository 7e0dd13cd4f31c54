use clap::Parser;
use log::{error, info};
use heart_rate_link::{init_logging, run};
use heart_rate_link::cli::Args;
use heart_rate_link::error::{AppRunError, ConfigError};

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.log_level());
    info!(concat!("Heart Rate Link ", env!("CARGO_PKG_VERSION")));

    match run(args).await {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("This application has already been started");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
