//! Makes "open a PR for these pipeline-produced changes" idempotent:
//! re-running with identical inputs reuses the pushed branch and the open
//! PR instead of duplicating either.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use cairn_core::driver::{AutoMergeMode, GitIdentity, PlatformDriver, PrCreateSpec};

use crate::git_backend::GitBackend;

/// Marker appended to generated commit messages so the resulting push does
/// not trigger another pipeline run.
pub const SKIP_CI_MARKER: &str = "[skip ci]";

#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    /// Glob patterns selecting which changed files ride on the PR; empty
    /// means every changed file.
    pub globs: Vec<String>,
    pub source_branch: Option<String>,
    pub target_branch: String,
    pub title: String,
    pub description: String,
    /// Explicit commit message; suppresses the CI-skip suffix.
    pub message: Option<String>,
    pub merge: bool,
    pub rebase: bool,
    pub squash: bool,
    /// When set, the driver's git identity commands run before committing.
    pub identity: Option<GitIdentity>,
    /// Render the result as `[title](url)` instead of the bare URL.
    pub render_link: bool,
}

/// Opens (or reuses) a PR carrying the matched local changes; `Ok(None)`
/// means there was nothing to do.
pub async fn open_pr(
    driver: &dyn PlatformDriver,
    git: &dyn GitBackend,
    options: &PrOptions,
) -> Result<Option<String>> {
    let changed = git.changed_files().await?;
    let matched = match_paths(&changed, &options.globs)?;
    if matched.is_empty() {
        tracing::debug!("no changed files match the requested patterns; nothing to do");
        return Ok(None);
    }

    let head_sha = git.head_sha().await?;
    let source_branch = options.source_branch.clone().unwrap_or_else(|| {
        let suffix = &head_sha[..head_sha.len().min(8)];
        format!("{}-patch-{suffix}", options.target_branch)
    });

    if git.remote_branch_exists(&source_branch).await? {
        // The branch from an earlier run is already pushed; never push
        // again, just surface the PR that carries it.
        let prs = driver.prs_list().await?;
        let existing = prs.iter().find(|pr| {
            pr.source_branch.ends_with(&source_branch)
                && pr.target_branch.ends_with(&options.target_branch)
        });
        return Ok(existing.map(|pr| render_url(options, &pr.url)));
    }

    if let Some(identity) = &options.identity {
        for command in driver.update_git_config(identity) {
            git.run(&command)
                .await
                .with_context(|| format!("git config command {command:?} failed"))?;
        }
    }

    let auto_merge = AutoMergeMode::resolve(options.merge, options.rebase, options.squash);
    git.fetch_commit(&head_sha).await?;
    git.checkout_branch_at(&options.target_branch, &head_sha).await?;
    git.create_branch(&source_branch).await?;
    git.stage(&matched).await?;
    git.commit(&commit_message(options, auto_merge)).await?;
    git.push_upstream(&source_branch).await?;

    let pr = driver
        .pr_create(&PrCreateSpec {
            source_branch,
            target_branch: options.target_branch.clone(),
            title: options.title.clone(),
            description: options.description.clone(),
            auto_merge,
            skip_ci: options.message.is_none() && auto_merge.is_none(),
        })
        .await?;
    Ok(Some(render_url(options, &pr.url)))
}

fn match_paths(changed: &[String], globs: &[String]) -> Result<Vec<String>> {
    if globs.is_empty() {
        return Ok(changed.to_vec());
    }
    let set = build_glob_set(globs)?;
    Ok(changed
        .iter()
        .filter(|path| set.is_match(path))
        .cloned()
        .collect())
}

fn build_glob_set(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).with_context(|| format!("invalid path pattern '{glob}'"))?);
    }
    builder.build().context("failed to build path pattern set")
}

// A generated message gets the CI-skip suffix; an explicit message or a
// requested merge mode means the caller wants the pipeline to run.
fn commit_message(options: &PrOptions, auto_merge: AutoMergeMode) -> String {
    if let Some(message) = &options.message {
        return message.clone();
    }
    if auto_merge.is_none() {
        format!("{} {SKIP_CI_MARKER}", options.title)
    } else {
        options.title.clone()
    }
}

fn render_url(options: &PrOptions, url: &str) -> String {
    if options.render_link {
        format!("[{}]({url})", options.title)
    } else {
        url.to_string()
    }
}
