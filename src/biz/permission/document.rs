use app_error::AppError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// The permission definitions of one application, keyed by permission name.
pub type PermissionSnapshot = HashMap<String, PermissionEntry>;

/// Wire format of the permission file stored in the bucket: a JSON array of definitions.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct PermissionDocument(pub Vec<PermissionDefinition>);

#[derive(Debug, Deserialize)]
pub struct PermissionDefinition {
  pub permission: Permission,
  #[serde(default)]
  pub overrides: Option<Vec<PermissionOverride>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
  pub name: String,
  pub app: String,
  #[serde(default, deserialize_with = "truthy")]
  pub default_value: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverride {
  pub user_id: String,
  #[serde(default, deserialize_with = "truthy")]
  pub active: bool,
}

/// Flags are written by hand, so any JSON value is accepted: `null`, `false`, `0`, `""` and a
/// missing field are false, everything else is true.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  let flag = match value {
    Value::Null => false,
    Value::Bool(flag) => flag,
    Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
    Value::String(text) => !text.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  };
  Ok(flag)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionEntry {
  pub default_value: bool,
  pub overrides: HashMap<String, bool>,
}

impl PermissionEntry {
  pub fn resolve(&self, user_id: &str) -> bool {
    self
      .overrides
      .get(user_id)
      .copied()
      .unwrap_or(self.default_value)
  }
}

impl PermissionDocument {
  pub fn from_slice(data: &[u8]) -> Result<Self, AppError> {
    serde_json::from_slice(data).map_err(|err| AppError::InvalidDocument(err.to_string()))
  }

  /// Build a fresh snapshot holding only the definitions that belong to `app`.
  /// Later definitions and overrides win over earlier ones with the same key.
  pub fn into_snapshot(self, app: &str) -> PermissionSnapshot {
    let mut snapshot = PermissionSnapshot::new();
    for definition in self.0 {
      if definition.permission.app != app {
        continue;
      }

      let overrides = definition
        .overrides
        .unwrap_or_default()
        .into_iter()
        .map(|o| (o.user_id, o.active))
        .collect();

      snapshot.insert(
        definition.permission.name,
        PermissionEntry {
          default_value: definition.permission.default_value,
          overrides,
        },
      );
    }
    snapshot
  }
}
