use {
    chrono::{Local, NaiveDate},
    std::{
        fs::{self, File, OpenOptions},
        path::{Path, PathBuf},
    },
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

const LOG_FILE_PREFIX: &str = "bankly";

fn log_file_name(date: NaiveDate) -> String {
    format!("{LOG_FILE_PREFIX}-{}.log", date.format("%Y-%m-%d"))
}

/// Opens today's log file in `log_dir` for appending, creating both as needed.
fn open_log_file(log_dir: &Path, date: NaiveDate) -> std::io::Result<(File, PathBuf)> {
    fs::create_dir_all(log_dir)?;

    let path = log_dir.join(log_file_name(date));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    Ok((file, path))
}

/// Logs compact lines to the console and full lines, with module path and
/// thread id, to `<log_dir>/bankly-YYYY-MM-DD.log`. `RUST_LOG` takes
/// precedence over the `debug` flag.
pub fn init_logging(debug: bool, log_dir: &Path) -> std::io::Result<()> {
    let (file, log_file) = open_log_file(log_dir, Local::now().date_naive())?;

    let filter_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    let console_layer = fmt::layer().with_target(false).with_ansi(true).compact();

    // Storage failures are traced back through the module path.
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging to: {}", log_file.display());

    Ok(())
}
