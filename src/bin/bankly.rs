use {
    bankly::{Bankly, config::BanklyConfig, logging::init_logging},
    clap::Parser,
    std::process::ExitCode,
    tracing::error,
};

#[derive(Parser)]
#[command(version, about = "Personal banking ledger served over HTTP")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match BanklyConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load server config file: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.debug, &config.log_dir) {
        eprintln!("Error: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let app = match Bankly::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to open data files: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Bankly failed to run: {}", e);
            ExitCode::FAILURE
        }
    }
}
