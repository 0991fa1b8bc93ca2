use anyhow::Context;
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::config::Environment;

/// Register a subscriber as global default for the host process.
///
/// Fails if a global subscriber is already installed.
pub fn init_subscriber(app_env: &Environment, filters: Vec<String>) -> Result<(), anyhow::Error> {
  let name = "permission_gate".to_string();
  let sink = std::io::stdout;

  let env_filter = if filters.is_empty() {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  } else {
    EnvFilter::new(filters.join(","))
  };

  let builder = tracing_subscriber::fmt()
    .with_target(true)
    .with_max_level(tracing::Level::TRACE)
    .with_thread_ids(false)
    .with_file(false);

  match app_env {
    Environment::Local => {
      let subscriber = builder
        .with_ansi(true)
        .with_target(false)
        .pretty()
        .finish()
        .with(env_filter);
      set_global_default(subscriber).context("fail to set global tracing subscriber")?;
    },
    Environment::Production => {
      let formatting_layer = BunyanFormattingLayer::new(name, sink);
      let subscriber = builder
        .json()
        .finish()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
      set_global_default(subscriber).context("fail to set global tracing subscriber")?;
    },
  }
  Ok(())
}
