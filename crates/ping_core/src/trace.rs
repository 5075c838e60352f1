use cap_std::fs_utf8::Dir;
use miette::{Context, IntoDiagnostic, Result};

/// Env var for the log filter. eg: `PING_LOG=debug,ping_core::expiry=trace`
pub const PING_LOG_ENV: &str = "PING_LOG";
pub const PING_LOG_FILE_NAME: &str = "ping.log";

/// Logs go to `ping.log` inside the data dir and to stderr. stdout is left alone for the host's output.
///
/// The returned guard flushes the log file when dropped, so keep it alive until the end of main.
pub fn install_tracing(ping_dir: &Dir) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};
    // get the log level
    let filter_layer = EnvFilter::try_from_env(PING_LOG_ENV)
        .or_else(|_| EnvFilter::try_new("info"))
        .into_diagnostic()
        .wrap_err("failed to create log filter")?;
    // create log file in the data dir. This will also serve as a check that the directory is "writeable" by us
    let writer = std::io::BufWriter::new(
        ping_dir
            .create(PING_LOG_FILE_NAME)
            .into_diagnostic()
            .wrap_err("failed to create ping.log file")?,
    );
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(nb);
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .into_diagnostic()
        .wrap_err("failed to install tracing subscriber")?;
    Ok(guard)
}

/// Plain text miette reports (also mirrored to the log at debug level), and panics logged through tracing before the default hook runs.
pub fn install_miette_panic_hooks() -> Result<()> {
    miette::set_hook(Box::new(|diagnostic: &(dyn miette::Diagnostic + 'static)| {
        let handler = miette::NarratableReportHandler::new();
        let mut report = String::new();
        if let Err(e) = handler.render_report(&mut report, diagnostic) {
            tracing::error!("failed to render report: {e}");
        }
        tracing::debug!("miette report: {report}");
        Box::new(handler) as Box<dyn miette::ReportHandler>
    }))
    .wrap_err("failed to install miette hook")?;

    #[derive(Debug, thiserror::Error, miette::Diagnostic)]
    #[error("{0}")]
    #[diagnostic(help("set the `RUST_BACKTRACE=1` environment variable to display a backtrace."))]
    struct Panic(String);

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Something went wrong".to_string()
        };
        let mut report: Result<()> = Err(Panic(message).into());
        if let Some(loc) = panic_info.location() {
            report = report
                .with_context(|| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column()));
        }
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>").to_string();
        if let Err(err) = report.with_context(|| format!("thread {thread_name} panicked.")) {
            tracing::error!("crashing: {:?}", &err);
        }
        default_hook(panic_info);
    }));
    Ok(())
}
