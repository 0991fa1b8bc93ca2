use crate::biz::permission::document::{PermissionDocument, PermissionSnapshot};
use crate::biz::permission::logger::PermissionLogger;
use crate::component::bucket::BucketClient;
use app_error::AppError;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, trace};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

pub struct StoreOptions {
  pub app: String,
  pub bucket: String,
  pub object_key: String,
  /// `None` or zero falls back to [DEFAULT_UPDATE_INTERVAL].
  pub update_interval: Option<Duration>,
  pub client: Arc<dyn BucketClient>,
  pub logger: Arc<dyn PermissionLogger>,
  pub on_update: Option<UpdateCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
  /// The new snapshot replaced the previous one.
  Applied,
  FetchFailed,
  InvalidDocument,
  /// The document was valid but arrived after `uninstall`, or after a newer refresh was applied.
  Discarded,
}

#[derive(Default)]
struct InstallState {
  /// Bumped on every install so refreshes dispatched by an earlier install are recognised.
  epoch: u64,
  poller: Option<JoinHandle<()>>,
  applied_seq: u64,
}

/// Locally queryable copy of one application's permissions, refreshed from the bucket on a
/// fixed interval.
///
/// Readers never wait on a fetch: [PermissionStore::value] answers from whatever snapshot is
/// current. Each refresh builds a new snapshot and swaps it in whole.
pub struct PermissionStore {
  app: String,
  bucket: String,
  object_key: String,
  update_interval: Duration,
  client: Arc<dyn BucketClient>,
  logger: Arc<dyn PermissionLogger>,
  on_update: Option<UpdateCallback>,
  snapshot: ArcSwap<PermissionSnapshot>,
  state: Mutex<InstallState>,
  dispatch_seq: AtomicU64,
}

impl PermissionStore {
  pub fn new(options: StoreOptions) -> Self {
    let update_interval = options
      .update_interval
      .filter(|interval| !interval.is_zero())
      .unwrap_or(DEFAULT_UPDATE_INTERVAL);

    Self {
      app: options.app,
      bucket: options.bucket,
      object_key: options.object_key,
      update_interval,
      client: options.client,
      logger: options.logger,
      on_update: options.on_update,
      snapshot: ArcSwap::from_pointee(PermissionSnapshot::new()),
      state: Mutex::new(InstallState::default()),
      dispatch_seq: AtomicU64::new(0),
    }
  }

  pub fn app(&self) -> &str {
    &self.app
  }

  pub fn object_key(&self) -> &str {
    &self.object_key
  }

  pub fn update_interval(&self) -> Duration {
    self.update_interval
  }

  pub fn is_installed(&self) -> bool {
    self.state.lock().poller.is_some()
  }

  /// Start polling: one refresh right away on a separate task, then one every interval.
  ///
  /// Must be called within a tokio runtime. A second call while installed only logs a warning.
  pub fn install(self: &Arc<Self>) {
    let mut state = self.state.lock();
    if state.poller.is_some() {
      // the logger is host code and may call back into the store
      drop(state);
      self.logger.warn("Permission store installed twice, ignoring");
      return;
    }

    state.epoch += 1;
    let epoch = state.epoch;

    let store = self.clone();
    tokio::spawn(async move {
      store.refresh_in_epoch(epoch).await;
    });

    let weak_store = Arc::downgrade(self);
    let period = self.update_interval;
    state.poller = Some(tokio::spawn(async move {
      let mut interval = interval_at(Instant::now() + period, period);
      loop {
        interval.tick().await;
        match weak_store.upgrade() {
          // refreshes are not serialized: a slow fetch must not delay the next tick
          Some(store) => {
            tokio::spawn(async move {
              store.refresh_in_epoch(epoch).await;
            });
          },
          None => break,
        }
      }
    }));
    debug!(
      "permission store for app '{}' installed, polling every {:?}",
      self.app, period
    );
  }

  /// Stop polling. Fetches already in flight complete, but their results are dropped.
  pub fn uninstall(&self) {
    let mut state = self.state.lock();
    if let Some(poller) = state.poller.take() {
      poller.abort();
      debug!("permission store for app '{}' uninstalled", self.app);
    }
  }

  /// Answer from the current snapshot. Unknown permissions are denied.
  pub fn value(&self, permission_name: &str, user_id: &str) -> bool {
    let snapshot = self.snapshot.load();
    match snapshot.get(permission_name) {
      Some(entry) => entry.resolve(user_id),
      None => {
        let err = AppError::UnknownPermission {
          permission: permission_name.to_string(),
          app: self.app.clone(),
        };
        self.logger.error(&err.to_string(), None);
        false
      },
    }
  }

  /// Names of the permissions in the current snapshot, sorted.
  pub fn permission_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.snapshot.load().keys().cloned().collect();
    names.sort();
    names
  }

  /// Run one fetch, parse and apply cycle now.
  ///
  /// The result is only applied while the store is installed.
  pub async fn refresh(&self) -> RefreshOutcome {
    let epoch = self.state.lock().epoch;
    self.refresh_in_epoch(epoch).await
  }

  async fn refresh_in_epoch(&self, epoch: u64) -> RefreshOutcome {
    let seq = self.dispatch_seq.fetch_add(1, Ordering::SeqCst) + 1;
    trace!("dispatch permission refresh #{} for app '{}'", seq, self.app);

    let data = match self.client.get_object(&self.bucket, &self.object_key).await {
      Ok(data) => data,
      Err(err) => {
        self.logger.error("Error from S3.getObject", Some(&err));
        return RefreshOutcome::FetchFailed;
      },
    };

    let snapshot = match PermissionDocument::from_slice(&data) {
      Ok(document) => document.into_snapshot(&self.app),
      Err(err) => {
        self
          .logger
          .error("Invalid JSON from permission bucket", Some(&err));
        return RefreshOutcome::InvalidDocument;
      },
    };

    {
      let mut state = self.state.lock();
      if state.poller.is_none() || state.epoch != epoch {
        debug!("drop permission refresh #{}: store was uninstalled", seq);
        return RefreshOutcome::Discarded;
      }
      if seq <= state.applied_seq {
        debug!(
          "drop permission refresh #{}: #{} already applied",
          seq, state.applied_seq
        );
        return RefreshOutcome::Discarded;
      }
      state.applied_seq = seq;
      self.snapshot.store(Arc::new(snapshot));
    }

    if let Some(on_update) = self.on_update.clone() {
      tokio::spawn(async move { on_update() });
    }
    RefreshOutcome::Applied
  }
}

impl Drop for PermissionStore {
  fn drop(&mut self) {
    if let Some(poller) = self.state.get_mut().poller.take() {
      poller.abort();
    }
  }
}
