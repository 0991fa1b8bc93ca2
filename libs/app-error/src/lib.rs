use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Internal(#[from] anyhow::Error),

  #[error("{0}")]
  Configuration(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("Permission '{permission}' does not exist for app '{app}'")]
  UnknownPermission { permission: String, app: String },

  #[error("Invalid permission document:{0}")]
  InvalidDocument(String),

  #[cfg(feature = "s3_error")]
  #[error(transparent)]
  S3Error(#[from] s3::error::S3Error),

  #[error("s3 response error:{0}")]
  S3ResponseError(String),
}

impl AppError {
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, AppError::Unauthorized(_))
  }

  pub fn is_configuration_error(&self) -> bool {
    matches!(self, AppError::Configuration(_))
  }

  pub fn code(&self) -> ErrorCode {
    match self {
      AppError::Internal(_) => ErrorCode::Internal,
      AppError::Configuration(_) => ErrorCode::Configuration,
      AppError::Unauthorized(_) => ErrorCode::Unauthorized,
      AppError::UnknownPermission { .. } => ErrorCode::UnknownPermission,
      AppError::InvalidDocument(_) => ErrorCode::InvalidDocument,
      #[cfg(feature = "s3_error")]
      AppError::S3Error(_) => ErrorCode::S3Error,
      AppError::S3ResponseError(_) => ErrorCode::S3ResponseError,
    }
  }
}

#[derive(
  Eq, PartialEq, Copy, Debug, Clone, serde_repr::Serialize_repr, serde_repr::Deserialize_repr,
)]
#[repr(i32)]
pub enum ErrorCode {
  Internal = -1,
  Configuration = 1001,
  Unauthorized = 1002,
  UnknownPermission = 1003,
  InvalidDocument = 1004,
  #[cfg(feature = "s3_error")]
  S3Error = 1005,
  S3ResponseError = 1006,
}

impl ErrorCode {
  pub fn value(&self) -> i32 {
    *self as i32
  }
}

#[derive(Serialize)]
struct AppErrorSerde {
  code: ErrorCode,
  message: String,
}

impl From<&AppError> for AppErrorSerde {
  fn from(value: &AppError) -> Self {
    Self {
      code: value.code(),
      message: value.to_string(),
    }
  }
}

#[cfg(feature = "actix_web_error")]
impl actix_web::error::ResponseError for AppError {
  fn status_code(&self) -> actix_web::http::StatusCode {
    match self {
      AppError::Unauthorized(_) => actix_web::http::StatusCode::FORBIDDEN,
      _ => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> actix_web::HttpResponse {
    actix_web::HttpResponse::build(self.status_code()).json(AppErrorSerde::from(self))
  }
}
