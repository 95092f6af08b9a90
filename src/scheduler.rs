//! Four recurring loops over the coordinator and the store: a full
//! refresh of every category, a round-robin rotation that keeps single
//! categories fresh between full runs, cache cleanup, and a periodic
//! status report. All loops are gated by one shared running flag and are
//! cancelled together on stop.

use crate::coordinator::IngestionCoordinator;
use crate::store::CategoryStore;
use crate::types::{SchedulerConfig, SchedulerStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct SchedulerState {
    last_full_update: Option<DateTime<Utc>>,
    last_cleanup: Option<DateTime<Utc>>,
    /// Next category index the rotation loop will service.
    rotation_index: usize,
}

pub struct Scheduler {
    coordinator: Arc<IngestionCoordinator>,
    store: Arc<CategoryStore>,
    config: SchedulerConfig,
    is_running: Arc<RwLock<bool>>,
    state: Arc<RwLock<SchedulerState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<IngestionCoordinator>,
        store: Arc<CategoryStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            coordinator,
            store,
            config,
            is_running: Arc::new(RwLock::new(false)),
            state: Arc::new(RwLock::new(SchedulerState::default())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn all four loops. No-op when already running.
    pub async fn start(&self) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Scheduler already running");
                return;
            }
            *running = true;
        }

        info!("Starting scheduler");
        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(full_update_loop(
            self.coordinator.clone(),
            self.state.clone(),
            self.is_running.clone(),
            self.config.clone(),
        )));
        tasks.push(tokio::spawn(rotation_loop(
            self.coordinator.clone(),
            self.state.clone(),
            self.is_running.clone(),
            self.config.clone(),
        )));
        tasks.push(tokio::spawn(cleanup_loop(
            self.store.clone(),
            self.state.clone(),
            self.is_running.clone(),
            self.config.clone(),
        )));
        tasks.push(tokio::spawn(report_loop(
            self.store.clone(),
            self.state.clone(),
            self.is_running.clone(),
            self.config.clone(),
        )));
    }

    /// Cancel all loops and wait for them to wind down. An ingestion run
    /// already in flight finishes its current await before the task is
    /// dropped; there is no mid-batch preemption.
    pub async fn stop(&self) {
        {
            let mut running = self.is_running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        info!("Stopping scheduler");
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
            // Cancelled tasks surface a JoinError; that is the expected
            // outcome here.
            let _ = task.await;
        }
        info!("Scheduler stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            is_running: *self.is_running.read().await,
            last_full_update: state.last_full_update,
            last_cleanup: state.last_cleanup,
            rotation_index: state.rotation_index,
            total_categories: self.coordinator.categories().len(),
        }
    }
}

/// Full refresh of every category: once immediately, then on a fixed
/// interval. Per-category failures are ordinary results of a completed
/// run, so the timestamp is stamped and the full interval elapses either
/// way; an outage never shortens the cadence.
async fn full_update_loop(
    coordinator: Arc<IngestionCoordinator>,
    state: Arc<RwLock<SchedulerState>>,
    is_running: Arc<RwLock<bool>>,
    config: SchedulerConfig,
) {
    while *is_running.read().await {
        coordinator.process_all_categories().await;
        state.write().await.last_full_update = Some(Utc::now());
        tokio::time::sleep(config.full_update_interval).await;
    }
}

/// Incremental refresh of one category per tick, round-robin.
async fn rotation_loop(
    coordinator: Arc<IngestionCoordinator>,
    state: Arc<RwLock<SchedulerState>>,
    is_running: Arc<RwLock<bool>>,
    config: SchedulerConfig,
) {
    let categories = coordinator.categories();
    if categories.is_empty() {
        warn!("No categories configured, rotation loop idle");
        return;
    }

    while *is_running.read().await {
        tokio::time::sleep(config.rotation_interval).await;
        if !*is_running.read().await {
            break;
        }

        let index = {
            let mut state = state.write().await;
            let index = state.rotation_index % categories.len();
            state.rotation_index = (index + 1) % categories.len();
            index
        };

        let category = &categories[index];
        info!("Rotation refresh: {}", category);
        if !coordinator.process_category(category).await {
            warn!("Rotation refresh failed for {}", category);
        }
    }
}

async fn cleanup_loop(
    store: Arc<CategoryStore>,
    state: Arc<RwLock<SchedulerState>>,
    is_running: Arc<RwLock<bool>>,
    config: SchedulerConfig,
) {
    while *is_running.read().await {
        tokio::time::sleep(config.cleanup_interval).await;
        if !*is_running.read().await {
            break;
        }

        let removed = store.cleanup().await;
        state.write().await.last_cleanup = Some(Utc::now());
        info!("Scheduled cleanup removed {} files", removed);
    }
}

async fn report_loop(
    store: Arc<CategoryStore>,
    state: Arc<RwLock<SchedulerState>>,
    is_running: Arc<RwLock<bool>>,
    config: SchedulerConfig,
) {
    while *is_running.read().await {
        tokio::time::sleep(config.report_interval).await;
        if !*is_running.read().await {
            break;
        }

        let stats = store.stats().await;
        let state = state.read().await;
        let since = |t: Option<DateTime<Utc>>| match t {
            Some(t) => format!("{}m ago", Utc::now().signed_duration_since(t).num_minutes()),
            None => "never".to_string(),
        };
        info!(
            "Status: {} items in {} categories, {} daily archives, {} bytes on disk; last full update {}, last cleanup {}",
            stats.total_items,
            stats.categories.len(),
            stats.daily_archives,
            stats.disk_bytes,
            since(state.last_full_update),
            since(state.last_cleanup),
        );
    }
}
