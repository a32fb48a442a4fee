//! # Job Registry
//!
//! Background job lifecycle for long-running selection work: creation,
//! execution with progress reporting, cooperative cancellation at batch
//! boundaries, and retention cleanup.
//!
//! State machine per job: `Pending -> Running -> {Completed, Failed,
//! Cancelled}`. Each job's fields are written only by its owning executor
//! task or by `cancel`; readers get whole-value snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::selector::{ContentSelector, SelectionResult, SelectionStyles};

/// Inputs captured at job creation
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub clips: Vec<PathBuf>,
    pub music: PathBuf,
    pub target_seconds: u32,
    pub styles: SelectionStyles,
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// A background selection job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub config: JobConfig,
    pub state: JobState,
    /// Monotone non-decreasing progress in [0, 1]
    pub progress: f64,
    pub current_step: String,
    pub results: Option<Vec<Arc<SelectionResult>>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Registry owning all background jobs and their executor tasks
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    selector: Arc<ContentSelector>,
    batch_size: usize,
}

impl JobRegistry {
    pub fn new(selector: Arc<ContentSelector>, batch_size: usize) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            selector,
            batch_size: batch_size.max(1),
        }
    }

    /// Register a new pending job
    pub fn create(&self, config: JobConfig) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            config,
            state: JobState::Pending,
            progress: 0.0,
            current_step: "Initializing...".to_string(),
            results: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let clip_count = job.config.clips.len();
        self.jobs.lock().unwrap().insert(id, job);
        tracing::info!("Created job {id} for {clip_count} clips");
        id
    }

    /// Transition a pending job to running and launch its executor task
    pub fn start(&self, id: Uuid) -> Result<()> {
        {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or(JobError::NotFound { id: id.to_string() })?;
            job.state = JobState::Running;
            job.started_at = Some(Utc::now());
            job.current_step = "Starting analysis...".to_string();
        }

        tracing::info!("Starting job {id}");
        let jobs = self.jobs.clone();
        let selector = self.selector.clone();
        let batch_size = self.batch_size;
        tokio::spawn(async move {
            run_job(jobs, selector, id, batch_size).await;
        });
        Ok(())
    }

    /// Request cancellation. Only running jobs are cancellable; the
    /// executor observes the flag at the next batch boundary.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound { id: id.to_string() })?;
        if job.state != JobState::Running {
            return Err(JobError::NotCancellable { id: id.to_string() }.into());
        }
        job.state = JobState::Cancelled;
        tracing::info!("Cancelled job {id}");
        Ok(())
    }

    /// Whole-value snapshot for status queries
    pub fn snapshot(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    /// Results of a completed job
    pub fn results(&self, id: Uuid) -> Option<Vec<Arc<SelectionResult>>> {
        let jobs = self.jobs.lock().unwrap();
        let job = jobs.get(&id)?;
        if job.state == JobState::Completed {
            job.results.clone()
        } else {
            None
        }
    }

    /// Remove terminal jobs older than the retention threshold; returns the
    /// number removed.
    pub fn cleanup(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.state.is_terminal() && job.created_at < cutoff));
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::info!("Cleaned up {removed} old jobs");
        }
        removed
    }
}

/// Executor: fast analysis in bounded batches with progress updates and
/// cooperative cancellation at batch boundaries.
async fn run_job(
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    selector: Arc<ContentSelector>,
    id: Uuid,
    batch_size: usize,
) {
    let config = match jobs.lock().unwrap().get(&id) {
        Some(job) => job.config.clone(),
        None => return,
    };

    let total = config.clips.len();
    let total_batches = total.div_ceil(batch_size);
    let mut results: Vec<Arc<SelectionResult>> = Vec::new();
    let mut processed = 0usize;

    for (batch_idx, batch) in config.clips.chunks(batch_size).enumerate() {
        // Batch boundary: observe cancellation and publish progress
        {
            let mut jobs = jobs.lock().unwrap();
            let Some(job) = jobs.get_mut(&id) else { return };
            if job.state == JobState::Cancelled {
                job.completed_at = Some(Utc::now());
                tracing::info!("Job {id} stopped after cancellation");
                return;
            }
            job.progress = processed as f64 / total.max(1) as f64;
            job.current_step = format!(
                "Processing batch {}/{} ({} clips)...",
                batch_idx + 1,
                total_batches,
                batch.len()
            );
        }

        let analyses = futures::future::join_all(
            batch
                .iter()
                .map(|clip| selector.analyze_fast(clip, config.styles)),
        )
        .await;

        for (clip, outcome) in batch.iter().zip(analyses) {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!("Job {id}: skipping {:?}: {e}", clip.file_name().unwrap_or_default());
                }
            }
        }
        processed += batch.len();
        tracing::info!("Job {id}: processed {processed}/{total} clips");
    }

    results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());
    let keep = results
        .len()
        .min((config.target_seconds as usize / 3).max(5));
    results.truncate(keep);

    let mut jobs = jobs.lock().unwrap();
    let Some(job) = jobs.get_mut(&id) else { return };
    if job.state == JobState::Cancelled {
        job.completed_at = Some(Utc::now());
        return;
    }

    if results.is_empty() && total > 0 {
        job.state = JobState::Failed;
        job.error = Some("no clips could be analyzed".to_string());
        job.current_step = "Failed".to_string();
    } else {
        tracing::info!("Job {id}: selected {} best clips", results.len());
        job.state = JobState::Completed;
        job.results = Some(results);
        job.progress = 1.0;
        job.current_step = "Completed!".to_string();
    }
    job.completed_at = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisSettings, VisionConfig};
    use crate::ffmpeg::{FfmpegGateway, ToolPaths};

    fn registry() -> JobRegistry {
        let gateway = Arc::new(FfmpegGateway::with_tools(ToolPaths {
            ffmpeg: PathBuf::from("/bin/false"),
            ffprobe: PathBuf::from("/bin/false"),
            version: "test".to_string(),
        }));
        let selector = Arc::new(ContentSelector::new(
            gateway,
            AnalysisSettings::default(),
            VisionConfig::default(),
        ));
        JobRegistry::new(selector, 3)
    }

    fn config(clips: usize) -> JobConfig {
        JobConfig {
            clips: (0..clips)
                .map(|i| PathBuf::from(format!("/nonexistent/clip_{i}.mp4")))
                .collect(),
            music: PathBuf::from("/nonexistent/music.wav"),
            target_seconds: 30,
            styles: SelectionStyles::default(),
        }
    }

    #[test]
    fn test_create_is_pending() {
        let registry = registry();
        let id = registry.create(config(2));
        let job = registry.snapshot(id).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_cancel_requires_running() {
        let registry = registry();
        let id = registry.create(config(2));
        let err = registry.cancel(id).unwrap_err();
        assert!(err.to_string().contains("not cancellable"));
    }

    #[test]
    fn test_cancel_unknown_job() {
        let registry = registry();
        let err = registry.cancel(Uuid::new_v4()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_job_with_unreadable_clips_fails() {
        let registry = registry();
        let id = registry.create(config(2));
        registry.start(id).unwrap();

        // The executor drops unanalyzable clips and ends in Failed when
        // nothing survives
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let job = registry.snapshot(id).unwrap();
            if job.state.is_terminal() {
                assert_eq!(job.state, JobState::Failed);
                assert!(job.error.is_some());
                assert!(job.completed_at.unwrap() >= job.started_at.unwrap());
                assert!(job.started_at.unwrap() >= job.created_at);
                return;
            }
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_jobs() {
        let registry = registry();
        let id = registry.create(config(1));
        assert_eq!(registry.cleanup(24), 0);
        assert!(registry.snapshot(id).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_removes_old_terminal_jobs() {
        let registry = registry();
        let id = registry.create(config(1));
        {
            let mut jobs = registry.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).unwrap();
            job.state = JobState::Completed;
            job.created_at = Utc::now() - chrono::Duration::hours(48);
        }
        assert_eq!(registry.cleanup(24), 1);
        assert!(registry.snapshot(id).is_none());
    }
}
