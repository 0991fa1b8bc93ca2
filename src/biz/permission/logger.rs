use app_error::AppError;
use tracing::{error, info, warn};

/// Sink for the events raised by the store and the gate.
///
/// Hosts that want their own routing can inject an implementation; otherwise the events go
/// to `tracing` through [TracingLogger].
pub trait PermissionLogger: Send + Sync {
  fn info(&self, message: &str);

  fn warn(&self, message: &str);

  fn error(&self, message: &str, cause: Option<&AppError>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl PermissionLogger for TracingLogger {
  fn info(&self, message: &str) {
    info!("{}", message);
  }

  fn warn(&self, message: &str) {
    warn!("{}", message);
  }

  fn error(&self, message: &str, cause: Option<&AppError>) {
    match cause {
      Some(cause) => error!(code = cause.code().value(), "{}: {}", message, cause),
      None => error!("{}", message),
    }
  }
}
