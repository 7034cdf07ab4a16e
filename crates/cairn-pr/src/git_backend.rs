//! Git plumbing consumed by the PR reconciler. The trait keeps the
//! reconciliation algorithm testable without a repository; `GitCli` shells
//! out to the `git` binary.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Paths with uncommitted changes, as reported by `status --porcelain`.
    async fn changed_files(&self) -> Result<Vec<String>>;
    async fn head_sha(&self) -> Result<String>;
    async fn remote_branch_exists(&self, branch: &str) -> Result<bool>;
    async fn fetch_commit(&self, sha: &str) -> Result<()>;
    /// Checks out `branch` positioned at `sha`, creating or resetting it.
    async fn checkout_branch_at(&self, branch: &str, sha: &str) -> Result<()>;
    async fn create_branch(&self, branch: &str) -> Result<()>;
    async fn stage(&self, paths: &[String]) -> Result<()>;
    async fn commit(&self, message: &str) -> Result<()>;
    async fn push_upstream(&self, branch: &str) -> Result<()>;
    /// Runs an arbitrary git argv; used for driver-supplied identity and
    /// remote configuration commands.
    async fn run(&self, args: &[String]) -> Result<String>;
}

pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
}

impl GitCli {
    pub fn new(repo_dir: PathBuf, remote: impl Into<String>) -> Self {
        Self {
            repo_dir,
            remote: remote.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn changed_files(&self) -> Result<Vec<String>> {
        let stdout = self.git(&["status", "--porcelain"]).await?;
        Ok(parse_porcelain_status(&stdout))
    }

    async fn head_sha(&self) -> Result<String> {
        let stdout = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(stdout.trim().to_string())
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let refspec = format!("refs/heads/{branch}");
        let stdout = self
            .git(&["ls-remote", "--heads", &self.remote, &refspec])
            .await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn fetch_commit(&self, sha: &str) -> Result<()> {
        self.git(&["fetch", "--depth=1", &self.remote, sha]).await?;
        Ok(())
    }

    async fn checkout_branch_at(&self, branch: &str, sha: &str) -> Result<()> {
        self.git(&["checkout", "-B", branch, sha]).await?;
        Ok(())
    }

    async fn create_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn stage(&self, paths: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message]).await?;
        Ok(())
    }

    async fn push_upstream(&self, branch: &str) -> Result<()> {
        self.git(&["push", "--set-upstream", &self.remote, branch])
            .await?;
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        self.git(&borrowed).await
    }
}

fn parse_porcelain_status(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            // Two status columns, a space, then the path; renames keep the
            // new name.
            let path = &line[3..];
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            let unquoted = unquote_porcelain_path(path.trim());
            if unquoted.is_empty() {
                None
            } else {
                Some(unquoted)
            }
        })
        .collect()
}

// Paths with special or non-ASCII characters come back C-quoted
// (`"pl\303\266t.png"`) with backslash escapes and three-digit octal byte
// escapes.
fn unquote_porcelain_path(path: &str) -> String {
    let inner = match path.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(inner) => inner,
        None => return path.to_string(),
    };
    let bytes = inner.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != b'\\' || index + 1 == bytes.len() {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }
        match bytes[index + 1] {
            b'n' => {
                decoded.push(b'\n');
                index += 2;
            }
            b't' => {
                decoded.push(b'\t');
                index += 2;
            }
            b'"' => {
                decoded.push(b'"');
                index += 2;
            }
            b'\\' => {
                decoded.push(b'\\');
                index += 2;
            }
            first @ b'0'..=b'7'
                if index + 3 < bytes.len()
                    && bytes[index + 2].wrapping_sub(b'0') < 8
                    && bytes[index + 3].wrapping_sub(b'0') < 8 =>
            {
                let value = (u32::from(first - b'0') << 6)
                    | (u32::from(bytes[index + 2] - b'0') << 3)
                    | u32::from(bytes[index + 3] - b'0');
                decoded.push(value as u8);
                index += 4;
            }
            _ => {
                decoded.push(bytes[index]);
                index += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
