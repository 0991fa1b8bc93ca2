use app_error::AppError;
use async_trait::async_trait;
use parking_lot::Mutex;
use permission_gate::biz::permission::{
  PermissionLogger, PermissionStore, StoreOptions, UpdateCallback,
};
use permission_gate::component::bucket::BucketClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Info,
  Warn,
  Error,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
  pub level: Level,
  pub message: String,
  pub cause: Option<String>,
}

#[derive(Default)]
pub struct RecordingLogger {
  entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn entries(&self, level: Level) -> Vec<LogEntry> {
    self
      .entries
      .lock()
      .iter()
      .filter(|entry| entry.level == level)
      .cloned()
      .collect()
  }

  pub fn messages(&self, level: Level) -> Vec<String> {
    self
      .entries(level)
      .into_iter()
      .map(|entry| entry.message)
      .collect()
  }

  fn push(&self, level: Level, message: &str, cause: Option<String>) {
    self.entries.lock().push(LogEntry {
      level,
      message: message.to_string(),
      cause,
    });
  }
}

impl PermissionLogger for RecordingLogger {
  fn info(&self, message: &str) {
    self.push(Level::Info, message, None);
  }

  fn warn(&self, message: &str) {
    self.push(Level::Warn, message, None);
  }

  fn error(&self, message: &str, cause: Option<&AppError>) {
    self.push(Level::Error, message, cause.map(|c| c.to_string()));
  }
}

pub enum Reply {
  Body(String),
  Error(String),
  Delayed(Duration, Box<Reply>),
  /// The fetch never completes.
  Never,
}

impl Reply {
  pub fn document(value: serde_json::Value) -> Self {
    Reply::Body(value.to_string())
  }

  pub fn after(self, delay: Duration) -> Self {
    Reply::Delayed(delay, Box::new(self))
  }
}

type Script = Box<dyn Fn(usize) -> Reply + Send + Sync>;

/// Bucket double answering the n-th `get_object` call with `script(n)`.
pub struct ScriptedBucket {
  script: Script,
  calls: AtomicUsize,
  requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedBucket {
  pub fn new<F>(script: F) -> Arc<Self>
  where
    F: Fn(usize) -> Reply + Send + Sync + 'static,
  {
    Arc::new(Self {
      script: Box::new(script),
      calls: AtomicUsize::new(0),
      requests: Mutex::new(vec![]),
    })
  }

  /// Always answers with the same document.
  pub fn serving(value: serde_json::Value) -> Arc<Self> {
    let body = value.to_string();
    Self::new(move |_| Reply::Body(body.clone()))
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn requests(&self) -> Vec<(String, String)> {
    self.requests.lock().clone()
  }
}

#[async_trait]
impl BucketClient for ScriptedBucket {
  async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AppError> {
    let index = self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .requests
      .lock()
      .push((bucket.to_string(), key.to_string()));

    let mut reply = (self.script)(index);
    loop {
      match reply {
        Reply::Body(body) => return Ok(body.into_bytes()),
        Reply::Error(msg) => return Err(AppError::S3ResponseError(msg)),
        Reply::Delayed(delay, next) => {
          sleep(delay).await;
          reply = *next;
        },
        Reply::Never => return std::future::pending().await,
      }
    }
  }
}

pub fn update_channel() -> (UpdateCallback, UnboundedReceiver<()>) {
  let (tx, rx) = unbounded_channel();
  let callback: UpdateCallback = Arc::new(move || {
    let _ = tx.send(());
  });
  (callback, rx)
}

pub async fn wait_for_update(rx: &mut UnboundedReceiver<()>) {
  timeout(Duration::from_secs(5), rx.recv())
    .await
    .expect("timeout waiting for permission update")
    .expect("update channel closed");
}

pub struct TestStore {
  pub store: Arc<PermissionStore>,
  pub bucket: Arc<ScriptedBucket>,
  pub logger: Arc<RecordingLogger>,
}

pub fn test_store(
  app: &str,
  bucket: Arc<ScriptedBucket>,
  update_interval: Option<Duration>,
  on_update: Option<UpdateCallback>,
) -> TestStore {
  let logger = RecordingLogger::new();
  let store = Arc::new(PermissionStore::new(StoreOptions {
    app: app.to_string(),
    bucket: "bucket".to_string(),
    object_key: "STAGE/file.json".to_string(),
    update_interval,
    client: bucket.clone(),
    logger: logger.clone(),
    on_update,
  }));
  TestStore {
    store,
    bucket,
    logger,
  }
}
