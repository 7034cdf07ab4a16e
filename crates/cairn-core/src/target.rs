//! Resolved destination for a report comment: a commit or a pull/merge
//! request. Resolution from CLI arguments happens outside this engine; the
//! reconciler consumes the resolved value opaquely.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Commit,
    PullRequest,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::PullRequest => "pr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTarget {
    pub kind: TargetKind,
    pub id: String,
}

impl CommentTarget {
    pub fn commit(sha: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Commit,
            id: sha.into(),
        }
    }

    pub fn pull_request(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::PullRequest,
            id: id.into(),
        }
    }
}

impl fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for CommentTarget {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('/') {
            Some(("commit", sha)) if !sha.is_empty() => Ok(Self::commit(sha)),
            Some(("pr", id)) if !id.is_empty() => Ok(Self::pull_request(id)),
            _ => Err(ConfigError::MalformedTarget(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        for raw in ["commit/abc123", "pr/17"] {
            let target: CommentTarget = raw.parse().expect("parse");
            assert_eq!(target.to_string(), raw);
        }
    }

    #[test]
    fn malformed_targets_are_rejected() {
        for raw in ["", "commit/", "branch/main", "pr"] {
            assert!(raw.parse::<CommentTarget>().is_err(), "accepted {raw:?}");
        }
    }
}
