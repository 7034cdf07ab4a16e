//! Invisible report watermark: an image-markdown literal whose title text
//! identifies "the same logical report" across edits.
//!
//! Matching is literal substring containment, so the rendered text must be
//! escaped exactly once; the hosting platforms' markdown renderers would
//! otherwise rewrite `_ * [ <` on round-trip and break the match.

use crate::error::ConfigError;

/// Fixed image each watermark points at. The image itself renders as a
/// transparent pixel; only its title text carries identity.
pub const WATERMARK_IMAGE_URL: &str = "https://cairn-ci.dev/watermark.png";

/// Label applied when the caller does not supply one. Keeps the run id in
/// the token so reports from different runs stay distinguishable.
pub const DEFAULT_WATERMARK_LABEL: &str = "{workflow}:{run}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkParams {
    pub label: String,
    pub workflow_id: String,
    pub run_id: String,
}

impl WatermarkParams {
    pub fn new(label: Option<&str>, workflow_id: &str, run_id: &str) -> Self {
        Self {
            label: label
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(DEFAULT_WATERMARK_LABEL)
                .to_string(),
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
        }
    }
}

/// Renders the watermark token for a label/workflow/run triple.
pub fn render(params: &WatermarkParams) -> String {
    let substituted = params
        .label
        .replace("{workflow}", &params.workflow_id)
        .replace("{run}", &params.run_id);
    let escaped = escape_markdown_literals(substituted.trim());
    format!("![]({WATERMARK_IMAGE_URL} \"{escaped}\")")
}

/// True iff `body` contains `token` as a literal substring.
pub fn matches(body: &str, token: &str) -> bool {
    body.contains(token)
}

/// Appends the token to a report body, separated by a blank line.
pub fn attach(body: &str, token: &str) -> String {
    format!("{}\n\n{token}", body.trim_end())
}

/// Disabling the watermark makes update-mode impossible to satisfy, so the
/// combination is rejected before any I/O happens.
pub fn check_update_compatibility(rm_watermark: bool, update: bool) -> Result<(), ConfigError> {
    if rm_watermark && update {
        return Err(ConfigError::WatermarkRequiredForUpdate);
    }
    Ok(())
}

// Escape order is fixed: underscore, asterisk, opening bracket, opening
// angle bracket.
fn escape_markdown_literals(text: &str) -> String {
    text.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('<', "\\<")
}
