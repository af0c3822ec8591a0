//! In-memory [`ImmichSource`] for testing the scheduler without a server.
//!
//! Each domain returns its current canned record, or a scripted HTTP status
//! failure. An optional delay makes every fetch slow, and the source tracks
//! how many fetches were ever in flight at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{
    FetchError, ImmichSource, JOBS_PATH, JobQueue, QueueStatus, STATISTICS_PATH, STORAGE_PATH,
    ServerJobs, ServerStatistics, ServerStorage, UserUsage,
};
use crate::collector::Domain;

#[derive(Debug)]
struct Slot<T> {
    value: T,
    failure: Option<u16>,
}

impl<T: Clone> Slot<T> {
    fn new(value: T) -> Mutex<Self> {
        Mutex::new(Self {
            value,
            failure: None,
        })
    }
}

#[derive(Debug)]
pub struct MockSource {
    storage: Mutex<Slot<ServerStorage>>,
    statistics: Mutex<Slot<ServerStatistics>>,
    jobs: Mutex<Slot<ServerJobs>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new(storage: ServerStorage, statistics: ServerStatistics, jobs: ServerJobs) -> Self {
        Self {
            storage: Slot::new(storage),
            statistics: Slot::new(statistics),
            jobs: Slot::new(jobs),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A small server: two users, one with a quota, two job queues.
    pub fn typical() -> Self {
        Self::new(
            ServerStorage {
                disk_available_raw: 1_000_000.0,
                disk_size_raw: 4_000_000.0,
                disk_use_raw: 3_000_000.0,
                disk_usage_percentage: 75.0,
            },
            ServerStatistics {
                photos: 120.0,
                videos: 8.0,
                usage: 2_500_000.0,
                usage_by_user: vec![
                    user("u-1", "alice", 100.0, 5.0, 2_000_000.0, Some(10_000_000.0)),
                    user("u-2", "bob", 20.0, 3.0, 500_000.0, None),
                ],
            },
            ServerJobs {
                queues: [
                    ("thumbnailGeneration".to_owned(), queue(2.0, 1.0, true, false)),
                    ("metadataExtraction".to_owned(), queue(0.0, 0.0, false, false)),
                ]
                .into_iter()
                .collect(),
            },
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_storage(&self, value: ServerStorage) {
        lock(&self.storage).value = value;
    }

    pub fn set_statistics(&self, value: ServerStatistics) {
        lock(&self.statistics).value = value;
    }

    pub fn current_statistics(&self) -> ServerStatistics {
        lock(&self.statistics).value.clone()
    }

    pub fn set_jobs(&self, value: ServerJobs) {
        lock(&self.jobs).value = value;
    }

    /// Makes every fetch of `domain` fail with HTTP `status` until [`Self::recover`].
    pub fn fail(&self, domain: Domain, status: u16) {
        match domain {
            Domain::Storage => lock(&self.storage).failure = Some(status),
            Domain::Statistics => lock(&self.statistics).failure = Some(status),
            Domain::Jobs => lock(&self.jobs).failure = Some(status),
        }
    }

    pub fn recover(&self, domain: Domain) {
        match domain {
            Domain::Storage => lock(&self.storage).failure = None,
            Domain::Statistics => lock(&self.statistics).failure = None,
            Domain::Jobs => lock(&self.jobs).failure = None,
        }
    }

    /// Total number of fetches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running concurrently.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn fetch<T: Clone>(&self, slot: &Mutex<Slot<T>>, path: &'static str) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = {
            let slot = lock(slot);
            match slot.failure {
                Some(status) => Err(FetchError::Status { path, status }),
                None => Ok(slot.value.clone()),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ImmichSource for MockSource {
    async fn server_storage(&self) -> Result<ServerStorage, FetchError> {
        self.fetch(&self.storage, STORAGE_PATH).await
    }

    async fn server_statistics(&self) -> Result<ServerStatistics, FetchError> {
        self.fetch(&self.statistics, STATISTICS_PATH).await
    }

    async fn jobs(&self) -> Result<ServerJobs, FetchError> {
        self.fetch(&self.jobs, JOBS_PATH).await
    }
}

fn lock<T>(slot: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a per-user statistics record.
pub fn user(
    id: &str,
    name: &str,
    photos: f64,
    videos: f64,
    usage: f64,
    quota: Option<f64>,
) -> UserUsage {
    UserUsage {
        user_id: id.to_owned(),
        user_name: name.to_owned(),
        photos,
        videos,
        usage,
        quota_size_in_bytes: quota,
    }
}

/// Builds a job queue record with `active` and `waiting` counts.
pub fn queue(active: f64, waiting: f64, is_active: bool, is_paused: bool) -> JobQueue {
    JobQueue {
        job_counts: [
            ("active".to_owned(), active),
            ("completed".to_owned(), 0.0),
            ("failed".to_owned(), 0.0),
            ("delayed".to_owned(), 0.0),
            ("waiting".to_owned(), waiting),
            ("paused".to_owned(), 0.0),
        ]
        .into_iter()
        .collect(),
        queue_status: QueueStatus {
            is_active,
            is_paused,
        },
    }
}
