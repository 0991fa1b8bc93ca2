use crate::biz::permission::{
  PermissionLogger, PermissionStore, StoreOptions, TracingLogger, UpdateCallback,
};
use crate::component::bucket::{object_key, BucketClient, S3BucketClient};
use actix_service::{forward_ready, Service, Transform};
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{Error, HttpMessage, HttpResponse};
use app_error::AppError;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::Duration;

pub const MISSING_USER_MESSAGE: &str =
  "Missing authenticated user in request object. Is your middleware authenticated?";
pub const NOT_AUTHORIZED_MESSAGE: &str = "User is not authorized";
pub const NOT_CONFIGURED_MESSAGE: &str = "Permission client is not configured correctly";

/// Identity of the caller, inserted into the request extensions by the authentication
/// middleware that runs before the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
  pub email: String,
}

impl AuthenticatedUser {
  pub fn new<T: Into<String>>(email: T) -> Self {
    Self {
      email: email.into(),
    }
  }
}

#[derive(Clone, Default)]
pub struct PermissionGateConfig {
  pub app: Option<String>,
  pub s3_bucket: Option<String>,
  pub s3_bucket_prefix: Option<String>,
  pub s3_permissions_file: Option<String>,
  /// Only used to build the default client when `s3_client` is `None`.
  pub s3_region: Option<String>,
  /// S3 compatible endpoint for the default client, e.g. minio.
  pub s3_endpoint: Option<String>,
  pub s3_client: Option<Arc<dyn BucketClient>>,
  pub update_interval: Option<Duration>,
  pub on_update: Option<UpdateCallback>,
  pub logger: Option<Arc<dyn PermissionLogger>>,
  /// Respond 403 directly on deny (the default). When false, the request fails with
  /// [AppError::Unauthorized] instead so the host error handler decides the response.
  pub send_status: Option<bool>,
}

#[derive(Clone)]
enum GateState {
  Live {
    store: Arc<PermissionStore>,
    send_status: bool,
  },
  Misconfigured,
}

/// Builds per-permission middlewares that all consult the same [PermissionStore].
///
/// ```ignore
/// let gate = PermissionGate::new(config);
/// App::new().service(
///   web::scope("/admin")
///     .wrap(gate.require("admin_access"))
///     .route("", web::get().to(admin)),
/// )
/// ```
#[derive(Clone)]
pub struct PermissionGate {
  state: GateState,
  logger: Arc<dyn PermissionLogger>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.is_empty())
}

impl PermissionGate {
  /// Validate `config` and start polling. Any missing setting yields a gate that rejects
  /// every request.
  pub fn new(config: PermissionGateConfig) -> Self {
    let logger = config
      .logger
      .clone()
      .unwrap_or_else(|| Arc::new(TracingLogger));
    let misconfigured = |logger: Arc<dyn PermissionLogger>| Self {
      state: GateState::Misconfigured,
      logger,
    };

    let app = match non_empty(&config.app) {
      Some(app) => app.to_string(),
      None => {
        logger.error(
          "Missing 'app' configuration parameter in permission client",
          None,
        );
        return misconfigured(logger);
      },
    };

    let (bucket, prefix, file) = match (
      non_empty(&config.s3_bucket),
      non_empty(&config.s3_bucket_prefix),
      non_empty(&config.s3_permissions_file),
    ) {
      (Some(bucket), Some(prefix), Some(file)) => (bucket, prefix, file),
      _ => {
        logger.error("Invalid S3 configuration in permission client", None);
        return misconfigured(logger);
      },
    };

    let client = match config.s3_client.clone() {
      Some(client) => client,
      None => match default_client(&config) {
        Ok(client) => client,
        Err(err) => {
          logger.error("Unable to create the S3 client for permission client", Some(&err));
          return misconfigured(logger);
        },
      },
    };

    let store = Arc::new(PermissionStore::new(StoreOptions {
      app,
      bucket: bucket.to_string(),
      object_key: object_key(prefix, file),
      update_interval: config.update_interval,
      client,
      logger: logger.clone(),
      on_update: config.on_update.clone(),
    }));
    store.install();

    Self {
      state: GateState::Live {
        store,
        send_status: config.send_status.unwrap_or(true),
      },
      logger,
    }
  }

  /// Middleware that only lets requests through when the caller holds `permission`.
  pub fn require<T: Into<String>>(&self, permission: T) -> RequirePermission {
    RequirePermission {
      permission: Arc::from(permission.into()),
      state: self.state.clone(),
      logger: self.logger.clone(),
    }
  }

  /// Stop the store polling. Calling it again, or on a misconfigured gate, does nothing.
  pub fn dispose(&self) {
    if let GateState::Live { store, .. } = &self.state {
      store.uninstall();
    }
  }

  pub fn is_configured(&self) -> bool {
    matches!(self.state, GateState::Live { .. })
  }

  pub fn store(&self) -> Option<&Arc<PermissionStore>> {
    match &self.state {
      GateState::Live { store, .. } => Some(store),
      GateState::Misconfigured => None,
    }
  }
}

fn default_client(config: &PermissionGateConfig) -> Result<Arc<dyn BucketClient>, AppError> {
  let region = config.s3_region.clone().unwrap_or_default();
  let client = match non_empty(&config.s3_endpoint) {
    Some(endpoint) => S3BucketClient::with_endpoint(&region, endpoint),
    None => S3BucketClient::new(&region)?,
  };
  Ok(Arc::new(client))
}

#[derive(Debug, PartialEq, Eq)]
enum Decision {
  Allow,
  Deny(&'static str),
}

#[derive(Clone)]
pub struct RequirePermission {
  permission: Arc<str>,
  state: GateState,
  logger: Arc<dyn PermissionLogger>,
}

impl RequirePermission {
  pub fn permission(&self) -> &str {
    &self.permission
  }

  fn decide(&self, store: &PermissionStore, user: Option<&str>) -> Decision {
    match user {
      None => {
        self.logger.warn(MISSING_USER_MESSAGE);
        Decision::Deny(MISSING_USER_MESSAGE)
      },
      Some(email) => {
        if store.value(&self.permission, email) {
          Decision::Allow
        } else {
          self.logger.info(&format!(
            "User is not authorized to access permission {}",
            self.permission
          ));
          Decision::Deny(NOT_AUTHORIZED_MESSAGE)
        }
      },
    }
  }
}

impl<S, B> Transform<S, ServiceRequest> for RequirePermission
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = Error;
  type Transform = RequirePermissionMiddleware<S>;
  type InitError = ();
  type Future = Ready<Result<Self::Transform, Self::InitError>>;

  fn new_transform(&self, service: S) -> Self::Future {
    ready(Ok(RequirePermissionMiddleware {
      service,
      gate: self.clone(),
    }))
  }
}

pub struct RequirePermissionMiddleware<S> {
  service: S,
  gate: RequirePermission,
}

impl<S, B> Service<ServiceRequest> for RequirePermissionMiddleware<S>
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  forward_ready!(service);

  fn call(&self, req: ServiceRequest) -> Self::Future {
    let (store, send_status) = match &self.gate.state {
      GateState::Live { store, send_status } => (store, *send_status),
      GateState::Misconfigured => {
        let err = AppError::Configuration(NOT_CONFIGURED_MESSAGE.to_string());
        return Box::pin(ready(Err(Error::from(err))));
      },
    };

    let user = req
      .extensions()
      .get::<AuthenticatedUser>()
      .map(|user| user.email.clone())
      .filter(|email| !email.is_empty());

    match self.gate.decide(store, user.as_deref()) {
      Decision::Allow => {
        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
      },
      Decision::Deny(_) if send_status => {
        let resp = req
          .into_response(HttpResponse::Forbidden().finish())
          .map_into_right_body();
        Box::pin(ready(Ok(resp)))
      },
      Decision::Deny(message) => {
        let err = AppError::Unauthorized(message.to_string());
        Box::pin(ready(Err(Error::from(err))))
      },
    }
  }
}
