//! Worker pool
//!
//! Tracks registered workers and leases disjoint sets of them to runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{GolError, Result};
use crate::metrics::standard;
use crate::worker::WorkerLink;

/// Worker status within the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Available for the next run
    Idle,
    /// Leased to an active run
    Busy,
    /// Closed; never leased again
    Retired,
}

/// Information about a registered worker
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Worker ID, in registration order
    pub worker_id: u32,
    /// Address or name of the worker
    pub endpoint: String,
    /// Current status
    pub status: WorkerStatus,
}

struct PoolEntry {
    info: WorkerInfo,
    link: Arc<dyn WorkerLink>,
}

/// Workers leased to one run, in segment order
pub struct Lease {
    workers: Vec<(u32, Arc<dyn WorkerLink>)>,
}

impl Lease {
    pub fn worker_ids(&self) -> Vec<u32> {
        self.workers.iter().map(|(id, _)| *id).collect()
    }

    pub fn links(&self) -> Vec<Arc<dyn WorkerLink>> {
        self.workers.iter().map(|(_, link)| link.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Registry of workers owned by one coordinator
pub struct WorkerPool {
    workers: RwLock<BTreeMap<u32, PoolEntry>>,
    next_worker_id: RwLock<u32>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(BTreeMap::new()),
            next_worker_id: RwLock::new(0),
        }
    }

    /// Add a connected worker to the pool
    pub async fn register(&self, link: Arc<dyn WorkerLink>) -> u32 {
        let worker_id = {
            let mut next_id = self.next_worker_id.write().await;
            let id = *next_id;
            *next_id += 1;
            id
        };

        let info = WorkerInfo {
            worker_id,
            endpoint: link.endpoint().to_string(),
            status: WorkerStatus::Idle,
        };
        info!("Registered worker {} as worker_id={}", info.endpoint, worker_id);

        self.workers.write().await.insert(worker_id, PoolEntry { info, link });
        standard::REGISTERED_WORKERS.add(1);
        worker_id
    }

    /// Remove an idle or retired worker
    pub async fn deregister(&self, worker_id: u32) -> Result<()> {
        let mut workers = self.workers.write().await;
        match workers.get(&worker_id).map(|entry| entry.info.status) {
            None => Err(GolError::WorkerNotRegistered { worker_id }),
            Some(WorkerStatus::Busy) => Err(GolError::WorkerBusy),
            Some(status) => {
                workers.remove(&worker_id);
                if status != WorkerStatus::Retired {
                    standard::REGISTERED_WORKERS.add(-1);
                }
                info!("Worker {} deregistered", worker_id);
                Ok(())
            }
        }
    }

    /// Lease `count` idle workers, lowest ids first, or none at all
    pub async fn acquire(&self, count: usize) -> Result<Lease> {
        let mut workers = self.workers.write().await;

        let idle: Vec<u32> = workers
            .values()
            .filter(|entry| entry.info.status == WorkerStatus::Idle)
            .map(|entry| entry.info.worker_id)
            .take(count)
            .collect();

        if idle.len() < count {
            warn!("Requested {} workers, only {} idle", count, idle.len());
            return Err(GolError::InsufficientWorkers {
                requested: count,
                available: idle.len(),
            });
        }

        let mut leased = Vec::with_capacity(count);
        for id in idle {
            if let Some(entry) = workers.get_mut(&id) {
                entry.info.status = WorkerStatus::Busy;
                leased.push((id, entry.link.clone()));
            }
        }

        debug!("Leased workers {:?}", leased.iter().map(|(id, _)| id).collect::<Vec<_>>());
        Ok(Lease { workers: leased })
    }

    /// Return leased workers; `retire` marks them closed for good
    pub async fn release(&self, lease: Lease, retire: bool) {
        let retired = if retire { lease.worker_ids() } else { Vec::new() };
        self.release_retiring(lease, &retired).await
    }

    /// Return leased workers to idle, except `retired` which are never leased again
    pub async fn release_retiring(&self, lease: Lease, retired: &[u32]) {
        let mut workers = self.workers.write().await;
        for (id, _) in lease.workers {
            if let Some(entry) = workers.get_mut(&id) {
                if retired.contains(&id) {
                    entry.info.status = WorkerStatus::Retired;
                    standard::REGISTERED_WORKERS.add(-1);
                } else {
                    entry.info.status = WorkerStatus::Idle;
                }
            }
        }
    }

    /// Number of idle workers
    pub async fn idle_count(&self) -> usize {
        self.workers
            .read()
            .await
            .values()
            .filter(|entry| entry.info.status == WorkerStatus::Idle)
            .count()
    }

    /// Snapshot of every registered worker
    pub async fn workers(&self) -> Vec<WorkerInfo> {
        self.workers
            .read()
            .await
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ShutdownSignal;
    use crate::worker::{WorkerConfig, WorkerService};

    async fn pool_with(count: usize) -> WorkerPool {
        let pool = WorkerPool::new();
        for idx in 0..count {
            let (service, _) =
                WorkerService::spawn(format!("w{}", idx), &WorkerConfig::default(), ShutdownSignal::new());
            pool.register(Arc::new(service)).await;
        }
        pool
    }

    #[tokio::test]
    async fn test_capacity_error_leases_nothing() {
        let pool = pool_with(2).await;

        let err = pool.acquire(3).await.err().unwrap();
        assert!(matches!(err, GolError::InsufficientWorkers { requested: 3, available: 2 }));
        assert_eq!(pool.idle_count().await, 2);
    }

    #[tokio::test]
    async fn test_leases_are_disjoint() {
        let pool = pool_with(3).await;

        let first = pool.acquire(2).await.unwrap();
        assert_eq!(first.worker_ids(), vec![0, 1]);

        let second = pool.acquire(1).await.unwrap();
        assert_eq!(second.worker_ids(), vec![2]);
        assert!(pool.acquire(1).await.is_err());

        pool.release(first, false).await;
        assert_eq!(pool.idle_count().await, 2);
    }

    #[tokio::test]
    async fn test_partial_retirement() {
        let pool = pool_with(3).await;

        let lease = pool.acquire(3).await.unwrap();
        pool.release_retiring(lease, &[1]).await;

        let statuses: Vec<WorkerStatus> = pool.workers().await.iter().map(|w| w.status).collect();
        assert_eq!(
            statuses,
            vec![WorkerStatus::Idle, WorkerStatus::Retired, WorkerStatus::Idle]
        );
        assert_eq!(pool.acquire(2).await.unwrap().worker_ids(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_retired_workers_are_not_leased() {
        let pool = pool_with(2).await;

        let lease = pool.acquire(2).await.unwrap();
        assert!(matches!(pool.deregister(0).await, Err(GolError::WorkerBusy)));
        pool.release(lease, true).await;

        assert_eq!(pool.idle_count().await, 0);
        assert!(pool
            .workers()
            .await
            .iter()
            .all(|w| w.status == WorkerStatus::Retired));

        pool.deregister(0).await.unwrap();
        assert!(matches!(
            pool.deregister(0).await,
            Err(GolError::WorkerNotRegistered { worker_id: 0 })
        ));
    }
}
