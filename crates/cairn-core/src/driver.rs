//! Capability interface implemented once per hosting platform.
//!
//! The reconciliation engine depends only on this trait; it never branches
//! on a platform tag. Concrete drivers (comment/PR/runner/check API
//! clients) live outside this workspace.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::target::CommentTarget;

/// One comment as the platform reports it. Ordering in `comments_list` is
/// oldest-first; reconciliation scans from the tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub body: String,
    pub url: Option<String>,
}

/// Outcome of a publish: which comment now carries the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentHandle {
    pub id: String,
    pub url: Option<String>,
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub url: String,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoMergeMode {
    Merge,
    Rebase,
    Squash,
    None,
}

impl AutoMergeMode {
    /// The three merge flags are mutually exclusive; priority is
    /// merge > rebase > squash.
    pub fn resolve(merge: bool, rebase: bool, squash: bool) -> Self {
        if merge {
            Self::Merge
        } else if rebase {
            Self::Rebase
        } else if squash {
            Self::Squash
        } else {
            Self::None
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrCreateSpec {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
    pub auto_merge: AutoMergeMode,
    pub skip_ci: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerRecord {
    pub id: String,
    pub name: String,
    pub busy: bool,
}

/// Per-platform regex sources for runner log lifecycle detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerLogPatternSet {
    pub ready: String,
    pub job_started: String,
    pub job_ended: String,
    pub job_ended_succeeded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub head_sha: String,
    pub title: String,
    pub summary: String,
    pub conclusion: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub user_name: String,
    pub user_email: String,
    pub remote: String,
}

#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// Repository identity in the platform's `owner/name` form; used for
    /// log lines and runner events.
    fn repo_slug(&self) -> String;

    async fn comments_list(&self, target: &CommentTarget) -> Result<Vec<CommentRecord>>;
    async fn comment_create(&self, target: &CommentTarget, body: &str) -> Result<CommentRecord>;
    async fn comment_update(
        &self,
        target: &CommentTarget,
        id: &str,
        body: &str,
    ) -> Result<CommentRecord>;

    async fn prs_list(&self) -> Result<Vec<PullRequestRecord>>;
    async fn pr_create(&self, spec: &PrCreateSpec) -> Result<PullRequestRecord>;

    async fn runner_token_issue(&self) -> Result<String>;
    async fn runner_create(&self, name: &str, labels: &[String]) -> Result<RunnerRecord>;
    async fn runner_delete(&self, id: &str) -> Result<()>;
    async fn runner_list(&self) -> Result<Vec<RunnerRecord>>;
    async fn runner_by_id(&self, id: &str) -> Result<Option<RunnerRecord>>;
    /// Job currently assigned to the named runner, when the platform can
    /// answer that; used as a fallback when logs omit the job id.
    async fn runner_job_lookup(&self, runner_name: &str) -> Result<Option<String>>;
    fn runner_log_patterns(&self) -> RunnerLogPatternSet;

    async fn check_create(&self, spec: &CheckSpec) -> Result<()>;

    /// Ordered git argv lists that configure committer identity and the
    /// authenticated remote; the caller runs them verbatim, in order.
    fn update_git_config(&self, identity: &GitIdentity) -> Vec<Vec<String>>;

    async fn pipeline_rerun(&self, pipeline_id: &str) -> Result<()>;
    async fn pipeline_jobs(&self, pipeline_id: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_merge_resolution_priority() {
        assert_eq!(AutoMergeMode::resolve(true, true, true), AutoMergeMode::Merge);
        assert_eq!(AutoMergeMode::resolve(false, true, true), AutoMergeMode::Rebase);
        assert_eq!(AutoMergeMode::resolve(false, false, true), AutoMergeMode::Squash);
        assert_eq!(AutoMergeMode::resolve(false, false, false), AutoMergeMode::None);
    }
}
