use crate::component::bucket::BucketClient;
use anyhow::anyhow;
use app_error::AppError;
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::{instrument, trace};

/// Default [BucketClient] backed by `rust-s3`.
///
/// Credentials are resolved on every fetch (environment first, then the shared profile), so
/// rotated keys are picked up by the next refresh without rebuilding the client.
#[derive(Debug, Clone)]
pub struct S3BucketClient {
  region: Region,
  path_style: bool,
}

impl S3BucketClient {
  pub fn new(region: &str) -> Result<Self, AppError> {
    let region = region
      .trim()
      .parse::<Region>()
      .map_err(|err| AppError::Configuration(format!("invalid s3 region '{}': {}", region, err)))?;
    Ok(Self {
      region,
      path_style: false,
    })
  }

  /// Talk to an S3 compatible endpoint, e.g. minio, using path style requests.
  pub fn with_endpoint(region: &str, endpoint: &str) -> Self {
    Self {
      region: Region::Custom {
        region: region.to_owned(),
        endpoint: endpoint.to_owned(),
      },
      path_style: true,
    }
  }

  pub fn region(&self) -> &Region {
    &self.region
  }

  fn credentials() -> Result<Credentials, AppError> {
    Credentials::from_env()
      .or_else(|_| Credentials::from_profile(None))
      .map_err(|err| AppError::Internal(anyhow!("no s3 credentials available: {}", err)))
  }
}

#[async_trait]
impl BucketClient for S3BucketClient {
  #[instrument(level = "debug", skip(self), err)]
  async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AppError> {
    let bucket = Bucket::new(bucket, self.region.clone(), Self::credentials()?)?;
    let bucket = if self.path_style {
      bucket.with_path_style()
    } else {
      bucket
    };

    let response = bucket.get_object(key).await?;
    check_s3_response_data(&response)?;
    trace!("fetched {} bytes from s3", response.bytes().len());
    Ok(response.bytes().to_vec())
  }
}

#[inline]
fn check_s3_response_data(resp: &s3::request::ResponseData) -> Result<(), AppError> {
  let status_code = resp.status_code();
  match status_code {
    200..=299 => Ok(()),
    error_code => {
      let text = resp.bytes();
      let s = String::from_utf8_lossy(text);
      let msg = format!("S3 error: {}, code: {}", s, error_code);
      Err(AppError::S3ResponseError(msg))
    },
  }
}
