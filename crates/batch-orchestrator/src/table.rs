//! The live job collection.
//!
//! `JobTable` keeps jobs in creation order behind a single lock. Every
//! mutation and every snapshot goes through that lock, and the lock is
//! never held across an `.await`.

use std::sync::RwLock;

use crate::job::{Job, JobKey};

/// Thread-safe, ordered collection of the jobs being orchestrated.
pub(crate) struct JobTable {
    jobs: RwLock<Vec<Job>>,
}

impl JobTable {
    /// Create a new empty table.
    pub(crate) fn new() -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Append a job.
    pub(crate) fn insert(&self, job: Job) {
        self.jobs.write().unwrap().push(job);
    }

    /// Get a copy of one job.
    ///
    /// Returns `None` if the job is not in the table.
    pub(crate) fn get(&self, key: JobKey) -> Option<Job> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .find(|job| job.key == key)
            .cloned()
    }

    /// Apply `f` to a job in place.
    ///
    /// Returns `None` without calling `f` if the job is not in the table.
    pub(crate) fn update<R>(&self, key: JobKey, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.jobs.write().unwrap();
        jobs.iter_mut().find(|job| job.key == key).map(f)
    }

    /// Remove a job, returning it.
    pub(crate) fn remove(&self, key: JobKey) -> Option<Job> {
        let mut jobs = self.jobs.write().unwrap();
        let index = jobs.iter().position(|job| job.key == key)?;
        Some(jobs.remove(index))
    }

    /// Remove a job only if it has failed.
    pub(crate) fn remove_failed(&self, key: JobKey) -> bool {
        let mut jobs = self.jobs.write().unwrap();
        match jobs.iter().position(|job| job.key == key && job.is_failed()) {
            Some(index) => {
                jobs.remove(index);
                true
            }
            None => false,
        }
    }

    /// Copy of every job, in creation order.
    pub(crate) fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().unwrap().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.read().unwrap().is_empty()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}
