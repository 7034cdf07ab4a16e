//! End-to-end publish flow: report document with a local asset, a mock
//! asset store, a fake platform driver, and two publish cycles that must
//! converge on a single updated comment.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use httpmock::{Method::POST, MockServer};

use cairn_core::driver::{
    CheckSpec, CommentRecord, GitIdentity, PlatformDriver, PrCreateSpec, PullRequestRecord,
    RunnerLogPatternSet, RunnerRecord,
};
use cairn_core::target::CommentTarget;
use cairn_core::watermark::WatermarkParams;
use cairn_publish::asset_store::HttpAssetStore;
use cairn_runtime::report_publisher::{ReportPublisher, ReportPublisherConfig};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

#[derive(Default)]
struct FakeDriver {
    comments: Mutex<Vec<CommentRecord>>,
}

#[async_trait]
impl PlatformDriver for FakeDriver {
    fn repo_slug(&self) -> String {
        "acme/models".to_string()
    }

    async fn comments_list(&self, _target: &CommentTarget) -> Result<Vec<CommentRecord>> {
        Ok(self.comments.lock().expect("lock").clone())
    }

    async fn comment_create(&self, _target: &CommentTarget, body: &str) -> Result<CommentRecord> {
        let mut comments = self.comments.lock().expect("lock");
        let record = CommentRecord {
            id: format!("c{}", comments.len() + 1),
            body: body.to_string(),
            url: Some(format!("https://host/comments/{}", comments.len() + 1)),
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
        Ok(Vec::new())
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
        Ok(Vec::new())
    }

    async fn runner_by_id(&self, _id: &str) -> Result<Option<RunnerRecord>> {
        Ok(None)
    }

    async fn runner_job_lookup(&self, _runner_name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn runner_log_patterns(&self) -> RunnerLogPatternSet {
        RunnerLogPatternSet {
            ready: "Listening for Jobs".to_string(),
            job_started: r"Running job (?P<job>\d+)".to_string(),
            job_ended: "Job (succeeded|failed)".to_string(),
            job_ended_succeeded: "Job succeeded".to_string(),
        }
    }

    async fn check_create(&self, _spec: &CheckSpec) -> Result<()> {
        Ok(())
    }

    fn update_git_config(&self, _identity: &GitIdentity) -> Vec<Vec<String>> {
        Vec::new()
    }

    async fn pipeline_rerun(&self, _pipeline_id: &str) -> Result<()> {
        Ok(())
    }

    async fn pipeline_jobs(&self, _pipeline_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn publisher_config(document: PathBuf) -> ReportPublisherConfig {
    let mut config = ReportPublisherConfig::new(
        document,
        CommentTarget::commit("abc123def"),
        WatermarkParams::new(None, "train-model", "run-7"),
    );
    config.session_id = Some("sess-1".to_string());
    config
}

#[tokio::test]
async fn publishing_twice_converges_on_one_updated_comment() {
    let store = MockServer::start_async().await;
    let upload = store
        .mock_async(|when, then| {
            when.method(POST)
                .header("content-type", "image/png")
                .header("content-address-seed", "sess-1:plot.png");
            then.status(200).body("https://store.example/obj1");
        })
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let document = dir.path().join("report.md");
    std::fs::write(dir.path().join("plot.png"), PNG).expect("asset");
    std::fs::write(&document, "# Metrics\n\n![plot](plot.png)\n").expect("report");

    let driver = Arc::new(FakeDriver::default());
    let uploader = Arc::new(HttpAssetStore::new(&store.base_url()).expect("store client"));
    let publisher = ReportPublisher::new(
        driver.clone(),
        uploader,
        publisher_config(document.clone()),
    );

    let first = publisher.publish_once(true).await.expect("first publish");
    assert!(!first.updated);

    std::fs::write(&document, "# Metrics v2\n\n![plot](plot.png)\n").expect("rewrite");
    let second = publisher.publish_once(true).await.expect("second publish");
    assert!(second.updated);
    assert_eq!(first.id, second.id);

    let comments = driver.comments.lock().expect("lock");
    assert_eq!(comments.len(), 1, "re-publish must not create a second comment");
    let body = &comments[0].body;
    assert!(body.contains("Metrics v2"));
    assert!(body.contains("https://store.example/obj1?cml=png&rev="));
    assert!(!body.contains("(plot.png)"));
    assert!(body.contains("![](https://cairn-ci.dev/watermark.png"));
    assert_eq!(upload.calls_async().await, 2);
}

#[tokio::test]
async fn watermarkless_publish_posts_the_bare_report() {
    let store = MockServer::start_async().await;
    store
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body("https://store.example/obj1");
        })
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let document = dir.path().join("report.md");
    std::fs::write(&document, "plain report\n").expect("report");

    let driver = Arc::new(FakeDriver::default());
    let uploader = Arc::new(HttpAssetStore::new(&store.base_url()).expect("store client"));
    let mut config = publisher_config(document);
    config.rm_watermark = true;
    let publisher = ReportPublisher::new(driver.clone(), uploader, config);

    publisher.publish_once(false).await.expect("publish");

    let comments = driver.comments.lock().expect("lock");
    assert_eq!(comments[0].body, "plain report\n");

    let error = publisher.publish_once(true).await.expect_err("incompatible");
    assert!(error.to_string().contains("watermark removal"));
}

#[tokio::test]
async fn watch_mode_rejects_a_watermarkless_config_before_any_publish() {
    let store = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let document = dir.path().join("report.md");
    std::fs::write(&document, "report\n").expect("report");

    let driver = Arc::new(FakeDriver::default());
    let uploader = Arc::new(HttpAssetStore::new(&store.base_url()).expect("store client"));
    let mut config = publisher_config(document);
    config.rm_watermark = true;
    let publisher = Arc::new(ReportPublisher::new(driver.clone(), uploader, config));

    let error = publisher.publish_and_watch().await.expect_err("incompatible");
    assert!(error.to_string().contains("watermark removal"));
    assert!(
        driver.comments.lock().expect("lock").is_empty(),
        "no comment may be posted before the config is validated"
    );
}
