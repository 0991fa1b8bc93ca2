mod s3_client;

pub use s3_client::*;

use app_error::AppError;
use async_trait::async_trait;

/// Object storage capability the permission store pulls its document from.
///
/// One call is one attempt: retries, if any, belong to the implementation.
#[async_trait]
pub trait BucketClient: Send + Sync {
  async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AppError>;
}

/// Join `prefix` and `file` with `/`, collapsing every run of slashes into one.
pub fn object_key(prefix: &str, file: &str) -> String {
  let joined = format!("{}/{}", prefix, file);
  let mut key = String::with_capacity(joined.len());
  for c in joined.chars() {
    if c == '/' && key.ends_with('/') {
      continue;
    }
    key.push(c);
  }
  key
}
