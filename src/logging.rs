//! Request-scoped logging and subscriber setup.

use std::fmt;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter, Registry};

use crate::error::Category;

/// A request-scoped logging interface.
///
/// `RequestLog` is created by the handler for each invocation and handed to
/// business logic through [`Context::log`](crate::Context::log). It is
/// lifetime-bound to the request it describes.
///
/// Secret values are automatically redacted when logged due to
/// their `Debug` and `Display` implementations.
///
/// All log messages automatically include the request ID for tracing.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    /// Creates a logger bound to a request ID.
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs an info-level message with request ID.
    ///
    /// Use with `format_args!` for efficient formatting:
    /// ```no_run
    /// # use api_forms::{RequestLog, Secret};
    /// # fn example(log: &RequestLog) {
    /// let key = Secret::new("password");
    /// log.info(format_args!("Processing with key: {:?}", key));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs an error-level message with request ID.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }

    /// Records a pipeline failure at the severity its category calls for.
    ///
    /// Permission and authentication failures log at `warn`, client input at
    /// `debug`, everything server-side at `error`.
    pub(crate) fn failure(&self, stage: impl fmt::Display, category: Category, detail: &str) {
        match category {
            Category::Permission | Category::Authentication => tracing::warn!(
                request_id = %self.request_id,
                stage = %stage,
                category = %category,
                "{}",
                detail
            ),
            Category::ClientInput => tracing::debug!(
                request_id = %self.request_id,
                stage = %stage,
                category = %category,
                "{}",
                detail
            ),
            Category::ServerContract | Category::Unanticipated => tracing::error!(
                request_id = %self.request_id,
                stage = %stage,
                category = %category,
                "{}",
                detail
            ),
        }
    }
}

/// Installs a global JSON subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Installing a
/// subscriber is optional: without one, the crate's records are discarded.
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber is already set.
pub fn init_json() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(subscriber_fmt::layer().json().with_current_span(false))
        .try_init()
}

/// Runs `f` under a thread-local subscriber and returns everything it logged
/// as plain text, down to `trace`.
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
