use node_config::EnvSource;
use sentry::types::Dsn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, filtered by `RUST_LOG`. When `SENTRY_DSN` is set,
/// events are also reported to Sentry for as long as the returned guard
/// is alive.
pub fn init<E: EnvSource + ?Sized>(env: &E) -> Option<sentry::ClientInitGuard> {
    let mut dsn_error = None;
    let sentry_guard = match env.non_empty("SENTRY_DSN") {
        Ok(Some(dsn)) => match dsn.parse::<Dsn>() {
            Ok(dsn) => Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            })),
            Err(e) => {
                dsn_error = Some(e.to_string());
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            dsn_error = Some(e.to_string());
            None
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            sentry_guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .init();

    if let Some(e) = dsn_error {
        tracing::warn!(error = %e, "Invalid SENTRY_DSN, error reporting disabled");
    }

    sentry_guard
}
