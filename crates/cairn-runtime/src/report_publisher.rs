//! One publish cycle end to end: read the report document, publish its
//! local assets, reconcile the comment on the resolved target; optionally
//! keep doing that from the watch loop until the process is killed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use cairn_comment::comment_reconciler::{publish_comment, CommentPublishRequest};
use cairn_comment::watch_loop::{ReconcileCycle, WatchLoop, WatchLoopConfig};
use cairn_core::driver::{CommentHandle, PlatformDriver};
use cairn_core::target::CommentTarget;
use cairn_core::watermark::{self, WatermarkParams};
use cairn_publish::asset_publish::{publish_assets, AssetPublishOptions};
use cairn_publish::asset_store::AssetUploader;

#[derive(Debug, Clone)]
pub struct ReportPublisherConfig {
    pub document: PathBuf,
    pub target: CommentTarget,
    pub watermark: WatermarkParams,
    pub rm_watermark: bool,
    pub update: bool,
    /// Rewrites local asset references before posting; off when the
    /// report carries no files.
    pub publish_assets: bool,
    pub session_id: Option<String>,
    pub trigger: Option<PathBuf>,
    pub stability_window: Duration,
}

impl ReportPublisherConfig {
    pub fn new(document: PathBuf, target: CommentTarget, watermark: WatermarkParams) -> Self {
        Self {
            document,
            target,
            watermark,
            rm_watermark: false,
            update: false,
            publish_assets: true,
            session_id: None,
            trigger: None,
            stability_window: Duration::from_millis(500),
        }
    }
}

pub struct ReportPublisher {
    driver: Arc<dyn PlatformDriver>,
    uploader: Arc<dyn AssetUploader>,
    config: ReportPublisherConfig,
}

impl ReportPublisher {
    pub fn new(
        driver: Arc<dyn PlatformDriver>,
        uploader: Arc<dyn AssetUploader>,
        config: ReportPublisherConfig,
    ) -> Self {
        Self {
            driver,
            uploader,
            config,
        }
    }

    /// Runs one full publish/update cycle.
    pub async fn publish_once(&self, update: bool) -> Result<CommentHandle> {
        watermark::check_update_compatibility(self.config.rm_watermark, update)?;

        let mut body = tokio::fs::read_to_string(&self.config.document)
            .await
            .with_context(|| format!("failed to read report {}", self.config.document.display()))?;

        if self.config.publish_assets {
            let document_dir = self
                .config
                .document
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            body = publish_assets(
                &body,
                &document_dir,
                self.uploader.as_ref(),
                &AssetPublishOptions {
                    session_id: self.config.session_id.clone(),
                    rm_watermark: self.config.rm_watermark,
                },
            )
            .await?;
        }

        let token = watermark::render(&self.config.watermark);
        let handle = publish_comment(
            self.driver.as_ref(),
            &self.config.target,
            &CommentPublishRequest {
                body: &body,
                token: &token,
                rm_watermark: self.config.rm_watermark,
                update,
            },
        )
        .await?;
        tracing::debug!(
            target = %self.config.target,
            comment_id = %handle.id,
            updated = handle.updated,
            "report published"
        );
        Ok(handle)
    }

    /// Publishes once, then keeps the comment reconciled on every settled
    /// file change until the process is terminated externally.
    pub async fn publish_and_watch(self: Arc<Self>) -> Result<()> {
        // Every reaction after the first updates in place; the
        // incompatible configuration is rejected before the initial
        // publish rather than failing on each cycle.
        watermark::check_update_compatibility(self.config.rm_watermark, true)?;
        self.publish_once(self.config.update).await?;

        let watch = WatchLoop::new(WatchLoopConfig {
            document: self.config.document.clone(),
            trigger: self.config.trigger.clone(),
            stability_window: self.config.stability_window,
            // The comment now exists; every reaction edits it in place.
            initial_update: true,
        });
        watch.run(self).await
    }
}

#[async_trait]
impl ReconcileCycle for ReportPublisher {
    async fn run(&self, update: bool) -> Result<()> {
        self.publish_once(update).await.map(|_| ())
    }
}
