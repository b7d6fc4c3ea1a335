//! Cached job/item state and reconciliation of polled snapshots against it.
//!
//! Unchanged snapshots keep their previous `Arc`, so consumers can skip work with
//! a pointer comparison.
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::job::{Job, JobDetail, JobId, JobItem, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailChange {
    Unchanged,
    /// Job fields changed; the cached item list was kept.
    JobOnly,
    Items,
}

/// Fields whose change is worth propagating.
pub fn job_changed(prev: &Job, next: &Job) -> bool {
    prev.status != next.status
        || prev.total_items != next.total_items
        || prev.submitted_items != next.submitted_items
        || prev.processed_items != next.processed_items
        || prev.succeeded_items != next.succeeded_items
        || prev.failed_items != next.failed_items
        || prev.flagged_items != next.flagged_items
        || prev.updated_at != next.updated_at
        || prev.seen != next.seen
}

pub fn items_changed(prev: &[JobItem], next: &[JobItem]) -> bool {
    prev.len() != next.len()
        || prev.iter().zip(next).any(|(a, b)| {
            a.id != b.id
                || a.status != b.status
                || a.updated_at != b.updated_at
                || a.flagged != b.flagged
                || a.has_edits != b.has_edits
        })
}

/// Keeps `prev` when nothing tracked changed.
pub fn reconcile_job(prev: &Arc<Job>, next: Job) -> Arc<Job> {
    if job_changed(prev, &next) {
        Arc::new(next)
    } else {
        Arc::clone(prev)
    }
}

pub fn reconcile_detail(
    prev: Option<&JobDetail>,
    job: Job,
    items: Vec<JobItem>,
) -> (JobDetail, DetailChange) {
    let Some(prev) = prev.filter(|p| p.job.id == job.id) else {
        let detail = JobDetail {
            job: Arc::new(job),
            items: Arc::new(items),
        };
        return (detail, DetailChange::Items);
    };

    if items_changed(&prev.items, &items) {
        let detail = JobDetail {
            job: reconcile_job(&prev.job, job),
            items: Arc::new(items),
        };
        return (detail, DetailChange::Items);
    }

    if job_changed(&prev.job, &job) {
        let detail = JobDetail {
            job: Arc::new(job),
            items: Arc::clone(&prev.items),
        };
        return (detail, DetailChange::JobOnly);
    }

    (prev.clone(), DetailChange::Unchanged)
}

fn is_completion(prev: JobStatus, next: JobStatus) -> bool {
    prev.is_active() && matches!(next, JobStatus::Completed | JobStatus::Cancelled)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListUpdate {
    pub changed: bool,
    /// Jobs seen moving from queued/running to completed/cancelled on this poll.
    pub completed: Vec<Arc<Job>>,
}

/// The job/item cache. Only the orchestrator writes to it.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    jobs: Arc<Vec<Arc<Job>>>,
    detail: Option<JobDetail>,
    selected: Option<JobId>,
    /// Jobs whose completion has already been announced.
    notified: BTreeSet<JobId>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &Arc<Vec<Arc<Job>>> {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&Arc<Job>> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn detail(&self) -> Option<&JobDetail> {
        self.detail.as_ref()
    }

    pub fn selected(&self) -> Option<&JobId> {
        self.selected.as_ref()
    }

    pub fn notified(&self) -> impl Iterator<Item = &JobId> {
        self.notified.iter()
    }

    pub fn restore_notified(&mut self, ids: impl IntoIterator<Item = JobId>) {
        self.notified.extend(ids);
    }

    /// Non-terminal jobs keep the poller running.
    pub fn has_active_jobs(&self) -> bool {
        self.jobs.iter().any(|job| !job.status.is_terminal())
            || self
                .detail
                .as_ref()
                .is_some_and(|detail| !detail.job.status.is_terminal())
    }

    pub fn select(&mut self, id: JobId) {
        if self.selected.as_ref() != Some(&id) {
            self.detail = None;
        }
        self.selected = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.detail = None;
    }

    /// Inserts or replaces a job outside the polling path (e.g. right after creation).
    pub fn upsert_job(&mut self, job: Job) {
        let mut jobs: Vec<Arc<Job>> = self.jobs.as_ref().clone();
        match jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = Arc::new(job),
            None => jobs.insert(0, Arc::new(job)),
        }
        self.jobs = Arc::new(jobs);
    }

    /// Forgets a deleted job, including its completion notice.
    pub fn remove_job(&mut self, id: &str) -> bool {
        if self.selected.as_deref() == Some(id) {
            self.clear_selection();
        }
        self.notified.remove(id);
        if !self.jobs.iter().any(|job| job.id == id) {
            return false;
        }
        let jobs = self.jobs.iter().filter(|job| job.id != id).cloned().collect();
        self.jobs = Arc::new(jobs);
        true
    }

    pub fn apply_job_list(&mut self, next: Vec<Job>) -> ListUpdate {
        let mut update = ListUpdate::default();
        let mut reconciled = Vec::with_capacity(next.len());

        for job in next {
            let merged = match self.job(&job.id) {
                Some(prev) => {
                    if is_completion(prev.status, job.status) {
                        update.completed.push(Arc::new(job.clone()));
                    }
                    reconcile_job(prev, job)
                }
                None => Arc::new(job),
            };
            reconciled.push(merged);
        }

        let same = reconciled.len() == self.jobs.len()
            && reconciled
                .iter()
                .zip(self.jobs.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b));
        if !same {
            self.jobs = Arc::new(reconciled);
            update.changed = true;
        }

        update.completed = self.take_unnotified(update.completed);
        update
    }

    /// Applies a detail page for the selected job. Returns `None` if the page is
    /// for a job that is no longer selected.
    pub fn apply_detail(
        &mut self,
        job: Job,
        items: Vec<JobItem>,
    ) -> Option<(DetailChange, Option<Arc<Job>>)> {
        if self.selected.as_deref() != Some(job.id.as_str()) {
            return None;
        }
        let prev_status = self.detail.as_ref().map(|d| d.job.status);
        let (detail, change) = reconcile_detail(self.detail.as_ref(), job, items);

        let completed = prev_status
            .filter(|prev| is_completion(*prev, detail.job.status))
            .map(|_| Arc::clone(&detail.job));
        let completed = self
            .take_unnotified(completed.into_iter().collect())
            .into_iter()
            .next();

        if change != DetailChange::Unchanged {
            self.detail = Some(detail);
        }
        Some((change, completed))
    }

    fn take_unnotified(&mut self, jobs: Vec<Arc<Job>>) -> Vec<Arc<Job>> {
        jobs.into_iter()
            .filter(|job| self.notified.insert(job.id.clone()))
            .collect()
    }
}
