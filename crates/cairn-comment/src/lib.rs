//! Comment reconciliation and the live file-watch loop that keeps a
//! posted report updated in place.

pub mod comment_reconciler;
pub mod watch_loop;

pub use comment_reconciler::{publish_comment, CommentPublishRequest};
pub use watch_loop::{ReconcileCycle, WatchLoop, WatchLoopConfig};
