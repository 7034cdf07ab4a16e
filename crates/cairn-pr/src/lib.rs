//! Idempotent "open a PR carrying these local changes": branch probing,
//! commit/push plumbing behind a backend trait, and PR reuse.

pub mod git_backend;
pub mod pr_reconciler;

pub use git_backend::{GitBackend, GitCli};
pub use pr_reconciler::{open_pr, PrOptions};
