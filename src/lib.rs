pub mod biz;
pub mod component;
pub mod config;
pub mod middleware;
pub mod telemetry;

pub use biz::permission::{PermissionLogger, PermissionStore, RefreshOutcome, TracingLogger};
pub use component::bucket::{BucketClient, S3BucketClient};
pub use middleware::permission_mw::{AuthenticatedUser, PermissionGate, PermissionGateConfig};
