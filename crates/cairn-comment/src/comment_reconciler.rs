//! Create-vs-update decision for a report comment.
//!
//! Re-posting the same logical report must keep a single comment thread:
//! with update requested, the newest comment whose body contains the
//! watermark token is edited in place; otherwise a new comment is created.

use anyhow::Result;

use cairn_core::driver::{CommentHandle, PlatformDriver};
use cairn_core::target::CommentTarget;
use cairn_core::watermark;

#[derive(Debug, Clone)]
pub struct CommentPublishRequest<'a> {
    pub body: &'a str,
    pub token: &'a str,
    pub rm_watermark: bool,
    pub update: bool,
}

/// Publishes `request.body` onto `target`, updating the existing
/// watermark-matched comment when `update` is requested.
///
/// Create and update are single driver calls; their failures surface
/// unchanged. The incompatible `rm_watermark && update` combination fails
/// before any driver call.
pub async fn publish_comment(
    driver: &dyn PlatformDriver,
    target: &CommentTarget,
    request: &CommentPublishRequest<'_>,
) -> Result<CommentHandle> {
    watermark::check_update_compatibility(request.rm_watermark, request.update)?;

    let body = if request.rm_watermark {
        request.body.to_string()
    } else {
        watermark::attach(request.body, request.token)
    };

    if request.update {
        let comments = driver.comments_list(target).await?;
        for comment in comments.iter().rev() {
            if watermark::matches(&comment.body, request.token) {
                tracing::debug!(
                    target = %target,
                    comment_id = %comment.id,
                    "watermark matched; updating existing comment"
                );
                let record = driver.comment_update(target, &comment.id, &body).await?;
                return Ok(CommentHandle {
                    id: record.id,
                    url: record.url,
                    updated: true,
                });
            }
        }
        tracing::debug!(target = %target, "no watermark match; falling through to create");
    }

    let record = driver.comment_create(target, &body).await?;
    Ok(CommentHandle {
        id: record.id,
        url: record.url,
        updated: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cairn_core::driver::{
        CheckSpec, CommentRecord, GitIdentity, PrCreateSpec, PullRequestRecord,
        RunnerLogPatternSet, RunnerRecord,
    };
    use cairn_core::error::ConfigError;
    use cairn_core::watermark::WatermarkParams;

    #[derive(Default)]
    struct FakeDriver {
        comments: Mutex<Vec<CommentRecord>>,
        list_calls: Mutex<usize>,
    }

    #[async_trait]
    impl PlatformDriver for FakeDriver {
        fn repo_slug(&self) -> String {
            "acme/models".to_string()
        }

        async fn comments_list(&self, _target: &CommentTarget) -> Result<Vec<CommentRecord>> {
            *self.list_calls.lock().expect("lock") += 1;
            Ok(self.comments.lock().expect("lock").clone())
        }

        async fn comment_create(
            &self,
            _target: &CommentTarget,
            body: &str,
        ) -> Result<CommentRecord> {
            let mut comments = self.comments.lock().expect("lock");
            let record = CommentRecord {
                id: format!("c{}", comments.len() + 1),
                body: body.to_string(),
                url: Some(format!("https://host/c{}", comments.len() + 1)),
            };
            comments.push(record.clone());
            Ok(record)
        }

        async fn comment_update(
            &self,
            _target: &CommentTarget,
            id: &str,
            body: &str,
        ) -> Result<CommentRecord> {
            let mut comments = self.comments.lock().expect("lock");
            let comment = comments
                .iter_mut()
                .find(|comment| comment.id == id)
                .expect("comment exists");
            comment.body = body.to_string();
            Ok(comment.clone())
        }

        async fn prs_list(&self) -> Result<Vec<PullRequestRecord>> {
            unreachable!("not exercised")
        }

        async fn pr_create(&self, _spec: &PrCreateSpec) -> Result<PullRequestRecord> {
            unreachable!("not exercised")
        }

        async fn runner_token_issue(&self) -> Result<String> {
            unreachable!("not exercised")
        }

        async fn runner_create(&self, _name: &str, _labels: &[String]) -> Result<RunnerRecord> {
            unreachable!("not exercised")
        }

        async fn runner_delete(&self, _id: &str) -> Result<()> {
            unreachable!("not exercised")
        }

        async fn runner_list(&self) -> Result<Vec<RunnerRecord>> {
            unreachable!("not exercised")
        }

        async fn runner_by_id(&self, _id: &str) -> Result<Option<RunnerRecord>> {
            unreachable!("not exercised")
        }

        async fn runner_job_lookup(&self, _runner_name: &str) -> Result<Option<String>> {
            unreachable!("not exercised")
        }

        fn runner_log_patterns(&self) -> RunnerLogPatternSet {
            unreachable!("not exercised")
        }

        async fn check_create(&self, _spec: &CheckSpec) -> Result<()> {
            unreachable!("not exercised")
        }

        fn update_git_config(&self, _identity: &GitIdentity) -> Vec<Vec<String>> {
            unreachable!("not exercised")
        }

        async fn pipeline_rerun(&self, _pipeline_id: &str) -> Result<()> {
            unreachable!("not exercised")
        }

        async fn pipeline_jobs(&self, _pipeline_id: &str) -> Result<Vec<String>> {
            unreachable!("not exercised")
        }
    }

    fn token() -> String {
        watermark::render(&WatermarkParams::new(None, "train", "42"))
    }

    #[tokio::test]
    async fn publish_twice_with_update_keeps_a_single_comment() {
        let driver = FakeDriver::default();
        let target = CommentTarget::commit("abc123");
        let token = token();
        let request = CommentPublishRequest {
            body: "metrics: ok",
            token: &token,
            rm_watermark: false,
            update: true,
        };

        let first = publish_comment(&driver, &target, &request).await.expect("first");
        let second = publish_comment(&driver, &target, &request).await.expect("second");

        assert!(!first.updated);
        assert!(second.updated);
        assert_eq!(first.id, second.id);
        assert_eq!(driver.comments.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn update_scans_newest_first() {
        let driver = FakeDriver::default();
        let target = CommentTarget::pull_request("9");
        let token = token();
        {
            let mut comments = driver.comments.lock().expect("lock");
            comments.push(CommentRecord {
                id: "old".to_string(),
                body: watermark::attach("stale", &token),
                url: None,
            });
            comments.push(CommentRecord {
                id: "new".to_string(),
                body: watermark::attach("fresh", &token),
                url: None,
            });
        }

        let handle = publish_comment(
            &driver,
            &target,
            &CommentPublishRequest {
                body: "latest",
                token: &token,
                rm_watermark: false,
                update: true,
            },
        )
        .await
        .expect("publish");

        assert_eq!(handle.id, "new");
        assert!(handle.updated);
    }

    #[tokio::test]
    async fn without_update_a_new_comment_is_created_each_time() {
        let driver = FakeDriver::default();
        let target = CommentTarget::commit("abc123");
        let token = token();
        let request = CommentPublishRequest {
            body: "metrics",
            token: &token,
            rm_watermark: false,
            update: false,
        };

        publish_comment(&driver, &target, &request).await.expect("first");
        publish_comment(&driver, &target, &request).await.expect("second");

        assert_eq!(driver.comments.lock().expect("lock").len(), 2);
        assert_eq!(*driver.list_calls.lock().expect("lock"), 0);
    }

    #[tokio::test]
    async fn rm_watermark_with_update_fails_before_any_driver_call() {
        let driver = FakeDriver::default();
        let target = CommentTarget::commit("abc123");
        let token = token();

        let error = publish_comment(
            &driver,
            &target,
            &CommentPublishRequest {
                body: "metrics",
                token: &token,
                rm_watermark: true,
                update: true,
            },
        )
        .await
        .expect_err("must fail");

        assert_eq!(
            error.downcast_ref::<ConfigError>(),
            Some(&ConfigError::WatermarkRequiredForUpdate)
        );
        assert_eq!(*driver.list_calls.lock().expect("lock"), 0);
        assert!(driver.comments.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn rm_watermark_posts_the_bare_body() {
        let driver = FakeDriver::default();
        let target = CommentTarget::commit("abc123");
        let token = token();

        publish_comment(
            &driver,
            &target,
            &CommentPublishRequest {
                body: "metrics",
                token: &token,
                rm_watermark: true,
                update: false,
            },
        )
        .await
        .expect("publish");

        let comments = driver.comments.lock().expect("lock");
        assert_eq!(comments[0].body, "metrics");
    }
}
