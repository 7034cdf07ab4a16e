//! Rewrites a markdown report so that every local image/link reference
//! points at a durably hosted URI.
//!
//! The transform is two-phase: the comrak AST identifies which references
//! are real link destinations (prose and code spans never qualify), the
//! uploads run concurrently, then the new URIs are spliced into the
//! original text. The document is never reserialized, so every byte
//! outside the rewritten destinations survives unchanged. Uploads happen
//! through the injected [`AssetUploader`] capability, so the transform
//! itself performs no global I/O.

use std::collections::HashMap;
use std::path::Path;

use comrak::nodes::NodeValue;
use comrak::{parse_document, Arena, Options};
use futures_util::future::join_all;
use thiserror::Error;

use cairn_core::uri_transforms::{append_watermark_param, cache_bust};
use cairn_core::watermark::WATERMARK_IMAGE_URL;

use crate::asset_store::{AssetStoreError, AssetUploader, UploadRequest};
use crate::mime_sniff::{self, SniffError};

#[derive(Debug, Error)]
pub enum AssetPublishError {
    #[error("failed to read asset '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to sniff asset '{path}': {source}")]
    Sniff {
        path: String,
        #[source]
        source: SniffError,
    },
    #[error("failed to upload asset '{reference}': {source}")]
    Upload {
        reference: String,
        #[source]
        source: AssetStoreError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AssetPublishOptions {
    /// Content-addressing session; when set, every upload carries a
    /// deterministic `session:path` seed so the store can deduplicate
    /// re-uploads of the same logical file.
    pub session_id: Option<String>,
    /// Suppresses the `?cml=<subtype>` watermark parameter on rewritten
    /// URIs.
    pub rm_watermark: bool,
}

/// Publishes every local reference of `markdown` (resolved relative to
/// `document_dir`) and returns the rewritten document.
///
/// A reference to a nonexistent file is tolerated and left unrewritten;
/// any other failure aborts the publish and the partially-processed output
/// is discarded.
pub async fn publish_assets(
    markdown: &str,
    document_dir: &Path,
    uploader: &dyn AssetUploader,
    options: &AssetPublishOptions,
) -> Result<String, AssetPublishError> {
    let references = collect_local_references(markdown);
    if references.is_empty() {
        return Ok(markdown.to_string());
    }

    let uploads = references
        .iter()
        .map(|reference| publish_one(reference, document_dir, uploader, options));
    let settled = join_all(uploads).await;

    let mut rewrites = HashMap::new();
    for (reference, outcome) in references.iter().zip(settled) {
        if let Some(uri) = outcome? {
            rewrites.insert(reference.clone(), uri);
        }
    }
    if rewrites.is_empty() {
        return Ok(markdown.to_string());
    }
    Ok(rewrite_document(markdown, &rewrites))
}

fn collect_local_references(markdown: &str) -> Vec<String> {
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &Options::default());
    let mut references = Vec::new();
    for node in root.descendants() {
        let data = node.data.borrow();
        let url = match &data.value {
            NodeValue::Link(link) | NodeValue::Image(link) => link.url.as_str(),
            _ => continue,
        };
        if is_publish_candidate(url) && !references.iter().any(|seen| seen == url) {
            references.push(url.to_string());
        }
    }
    references
}

// Candidates are non-empty filesystem references. Anything already
// addressable (scheme, protocol-relative, fragment, mailto, data) stays,
// as does the watermark's own image.
fn is_publish_candidate(url: &str) -> bool {
    !url.is_empty()
        && url != WATERMARK_IMAGE_URL
        && !url.contains("://")
        && !url.starts_with("//")
        && !url.starts_with('#')
        && !url.starts_with("mailto:")
        && !url.starts_with("data:")
}

async fn publish_one(
    reference: &str,
    document_dir: &Path,
    uploader: &dyn AssetUploader,
    options: &AssetPublishOptions,
) -> Result<Option<String>, AssetPublishError> {
    let path = document_dir.join(reference);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                reference = %reference,
                "referenced file not found; leaving reference unpublished"
            );
            return Ok(None);
        }
        Err(source) => {
            return Err(AssetPublishError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let mime = match mime_sniff::detect_buffer(&bytes) {
        Ok(mime) => mime,
        Err(SniffError::UnknownSignature) => {
            tracing::debug!(
                reference = %reference,
                "no signature matched; uploading as application/octet-stream"
            );
            "application/octet-stream".to_string()
        }
        Err(source) => {
            return Err(AssetPublishError::Sniff {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("asset")
        .to_string();
    let content_seed = options
        .session_id
        .as_ref()
        .map(|session| format!("{session}:{reference}"));

    let uri = uploader
        .upload(UploadRequest {
            bytes: bytes.clone(),
            mime: mime.clone(),
            filename,
            content_seed,
        })
        .await
        .map_err(|source| AssetPublishError::Upload {
            reference: reference.to_string(),
            source,
        })?;

    let uri = if options.rm_watermark {
        uri
    } else {
        append_watermark_param(&uri, &mime)
    };
    Ok(Some(cache_bust(&uri, &bytes)))
}

fn rewrite_document(markdown: &str, rewrites: &HashMap<String, String>) -> String {
    let mut output = markdown.to_string();
    for (reference, uri) in rewrites {
        output = rewrite_reference(&output, reference, uri);
    }
    output
}

// Splices `uri` over every occurrence of `reference` that sits in
// destination position: inline `](ref)` / `](ref "title")` or a reference
// definition `[label]: ref`. Prose mentions of the same text stay as they
// are, and no byte outside the destination is touched.
fn rewrite_reference(markdown: &str, reference: &str, uri: &str) -> String {
    let mut output = String::with_capacity(markdown.len());
    let mut rest = markdown;
    while let Some(found) = rest.find(reference) {
        let (before, tail) = rest.split_at(found);
        let after = &tail[reference.len()..];
        let opens_destination = before.ends_with("](") || is_definition_prefix(before);
        let closes_destination = after
            .chars()
            .next()
            .map(|next| matches!(next, ')' | ' ' | '\t' | '\r' | '\n'))
            .unwrap_or(true);
        output.push_str(before);
        if opens_destination && closes_destination {
            output.push_str(uri);
        } else {
            output.push_str(reference);
        }
        rest = after;
    }
    output.push_str(rest);
    output
}

// True when the current line so far reads `[label]:` plus whitespace.
fn is_definition_prefix(before: &str) -> bool {
    let line = before.rsplit('\n').next().unwrap_or(before);
    match line.trim_start().split_once("]:") {
        Some((label, gap)) => {
            label.starts_with('[') && gap.chars().all(|gap_char| gap_char == ' ' || gap_char == '\t')
        }
        None => false,
    }
}
