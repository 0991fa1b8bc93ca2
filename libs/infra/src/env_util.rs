use std::fmt::Display;
use std::str::FromStr;

/// Read `key` from the environment, falling back to `default` when it is unset or not unicode.
pub fn get_env_var(key: &str, default: &str) -> String {
  std::env::var(key).unwrap_or_else(|e| {
    tracing::debug!(
      "failed to read environment variable:{}:{}, using default value: {}",
      e,
      key,
      default
    );
    default.to_owned()
  })
}

/// Optionally get an environment variable.
/// if value is empty, return None.
pub fn get_env_var_opt(key: &str) -> Option<String> {
  match std::env::var(key) {
    Ok(val) if val.trim().is_empty() => None,
    Ok(val) => Some(val),
    Err(e) => {
      tracing::debug!("environment variable {} not set: {}", key, e);
      None
    },
  }
}

/// Read and parse `key`, using `default` when the variable is unset.
/// A value that is present but fails to parse is an error.
pub fn parse_env_var<T>(key: &str, default: &str) -> Result<T, String>
where
  T: FromStr,
  T::Err: Display,
{
  let raw = get_env_var(key, default);
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| format!("invalid value '{}' for {}: {}", raw, key, e))
}
