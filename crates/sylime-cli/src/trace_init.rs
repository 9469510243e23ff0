use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

/// Writes engine trace events to `udtool-trace.jsonl` under `log_dir`.
///
/// The returned guard flushes the writer when dropped; hold it for the
/// lifetime of the process or trailing events are lost.
pub fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(log_dir, "udtool-trace.jsonl");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_target(true)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sylime_core=debug")),
        )
        .init();
    guard
}
