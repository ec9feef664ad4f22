use std::borrow::Cow;

use sentry_tracing::{EventFilter, SentryLayer};
use tracing::Level;

/// Starts the sentry client when a DSN is configured. The guard must live
/// for the whole process.
pub fn init_once(dsn: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = dsn.filter(|dsn| !dsn.trim().is_empty())?;
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(Cow::Borrowed(if cfg!(debug_assertions) {
                "dev"
            } else {
                "production"
            })),
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Errors become sentry events, warnings become breadcrumbs.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR => EventFilter::Event,
        Level::WARN => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    })
}
