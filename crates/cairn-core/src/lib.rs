//! Shared types for the cairn publish and reconciliation engine.
//!
//! Holds the watermark codec used to recognize previously posted report
//! comments, the comment-target model, the platform driver capability
//! trait, and the URI transforms applied to published asset links.

pub mod driver;
pub mod error;
pub mod target;
pub mod uri_transforms;
pub mod watermark;

pub use driver::{
    AutoMergeMode, CheckSpec, CommentHandle, CommentRecord, GitIdentity, PlatformDriver,
    PrCreateSpec, PullRequestRecord, RunnerLogPatternSet, RunnerRecord,
};
pub use error::ConfigError;
pub use target::{CommentTarget, TargetKind};
pub use watermark::WatermarkParams;
