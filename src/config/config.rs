use crate::middleware::permission_mw::PermissionGateConfig;
use anyhow::{anyhow, Context};
use infra::env_util::{get_env_var, get_env_var_opt, parse_env_var};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
  pub app_env: Environment,
  pub permission: PermissionSetting,
  pub s3: S3Setting,
}

#[derive(Clone, Debug)]
pub struct PermissionSetting {
  pub app: Option<String>,
  /// Seconds between two refreshes. Zero means the default minute.
  pub update_interval_secs: u64,
  pub send_status: bool,
}

#[derive(Clone, Debug)]
pub struct S3Setting {
  pub bucket: Option<String>,
  pub bucket_prefix: Option<String>,
  pub permissions_file: Option<String>,
  pub region: String,
  /// Only set when talking to an S3 compatible server such as minio.
  pub endpoint: Option<String>,
}

impl Config {
  /// Gate configuration without the injectable collaborators (client, logger, callback);
  /// callers fill those in before building the gate.
  pub fn gate_config(&self) -> PermissionGateConfig {
    PermissionGateConfig {
      app: self.permission.app.clone(),
      s3_bucket: self.s3.bucket.clone(),
      s3_bucket_prefix: self.s3.bucket_prefix.clone(),
      s3_permissions_file: self.s3.permissions_file.clone(),
      s3_region: Some(self.s3.region.clone()),
      s3_endpoint: self.s3.endpoint.clone(),
      update_interval: Some(Duration::from_secs(self.permission.update_interval_secs)),
      send_status: Some(self.permission.send_status),
      ..Default::default()
    }
  }
}

// Required settings stay optional here: the gate reports what is missing and fails closed.
pub fn get_configuration() -> Result<Config, anyhow::Error> {
  let config = Config {
    app_env: get_env_var("PERMISSION_ENVIRONMENT", "local")
      .parse()
      .context("fail to get PERMISSION_ENVIRONMENT")?,
    permission: PermissionSetting {
      app: get_env_var_opt("PERMISSION_APP"),
      update_interval_secs: parse_env_var("PERMISSION_UPDATE_INTERVAL_SECS", "60")
        .map_err(|e| anyhow!(e))?,
      send_status: parse_env_var("PERMISSION_SEND_STATUS", "true").map_err(|e| anyhow!(e))?,
    },
    s3: S3Setting {
      bucket: get_env_var_opt("PERMISSION_S3_BUCKET"),
      bucket_prefix: get_env_var_opt("PERMISSION_S3_BUCKET_PREFIX"),
      permissions_file: get_env_var_opt("PERMISSION_S3_PERMISSIONS_FILE"),
      region: get_env_var("PERMISSION_S3_REGION", "eu-west-1"),
      endpoint: get_env_var_opt("PERMISSION_S3_ENDPOINT"),
    },
  };
  Ok(config)
}

/// The possible runtime environment for our application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
  Local,
  Production,
}

impl Environment {
  pub fn as_str(&self) -> &'static str {
    match self {
      Environment::Local => "local",
      Environment::Production => "production",
    }
  }
}

impl std::str::FromStr for Environment {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "local" => Ok(Self::Local),
      "production" => Ok(Self::Production),
      other => anyhow::bail!(
        "{} is not a supported environment. Use either `local` or `production`.",
        other
      ),
    }
  }
}
