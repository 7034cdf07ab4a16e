//! Stateless extraction of runner lifecycle events from one chunk of
//! process output. Repeated delivery of the same text yields repeated
//! events; the parser keeps no cross-call memory.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use cairn_core::driver::PlatformDriver;

use crate::log_patterns::CompiledLogPatterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Ready,
    JobStarted,
    JobEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunnerLogEvent {
    pub status: RunnerStatus,
    pub timestamp: DateTime<Utc>,
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub level: LogLevel,
}

/// Pure extraction pass: each status pattern is tested against the whole
/// chunk, in fixed order, and contributes at most one event.
pub fn extract_events(
    chunk: &str,
    patterns: &CompiledLogPatterns,
    repo: &str,
    now: DateTime<Utc>,
) -> Vec<RunnerLogEvent> {
    let mut events = Vec::new();

    if patterns.ready.is_match(chunk) {
        events.push(RunnerLogEvent {
            status: RunnerStatus::Ready,
            timestamp: now,
            repo: repo.to_string(),
            job: None,
            pipeline: None,
            success: None,
            level: LogLevel::Info,
        });
    }

    if let Some(captures) = patterns.job_started.captures(chunk) {
        let job = captures
            .name("job")
            .map(|capture| capture.as_str().to_string());
        let pipeline = captures
            .name("pipeline")
            .map(|capture| capture.as_str().to_string());
        events.push(RunnerLogEvent {
            status: RunnerStatus::JobStarted,
            timestamp: now,
            repo: repo.to_string(),
            job,
            pipeline,
            success: None,
            // A started job has not failed; only an unsuccessful end is an
            // error.
            level: LogLevel::Info,
        });
    }

    if patterns.job_ended.is_match(chunk) {
        let success = patterns.job_ended_succeeded.is_match(chunk);
        events.push(RunnerLogEvent {
            status: RunnerStatus::JobEnded,
            timestamp: now,
            repo: repo.to_string(),
            job: None,
            pipeline: None,
            success: Some(success),
            level: if success { LogLevel::Info } else { LogLevel::Error },
        });
    }

    events
}

/// Extraction plus the platform fallback: when a `job_started` line does
/// not embed the job id, cross-reference the runner name to its currently
/// assigned job through the driver.
pub async fn parse_chunk(
    chunk: &str,
    patterns: &CompiledLogPatterns,
    runner_name: &str,
    driver: &dyn PlatformDriver,
) -> Result<Vec<RunnerLogEvent>> {
    let mut events = extract_events(chunk, patterns, &driver.repo_slug(), Utc::now());
    for event in &mut events {
        if event.status == RunnerStatus::JobStarted && event.job.is_none() {
            match driver.runner_job_lookup(runner_name).await? {
                Some(job) => event.job = Some(job),
                None => {
                    tracing::debug!(
                        runner = %runner_name,
                        "job started but no job id could be resolved"
                    );
                }
            }
        }
    }
    Ok(events)
}
