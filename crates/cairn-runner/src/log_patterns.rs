use regex::Regex;
use thiserror::Error;

use cairn_core::driver::RunnerLogPatternSet;

/// A driver handing over a malformed pattern is a configuration problem,
/// reported once at compile time rather than on every chunk.
#[derive(Debug, Error)]
#[error("invalid '{name}' runner log pattern: {source}")]
pub struct PatternError {
    pub name: &'static str,
    #[source]
    pub source: regex::Error,
}

/// The driver's pattern set, compiled and validated.
#[derive(Debug, Clone)]
pub struct CompiledLogPatterns {
    pub ready: Regex,
    pub job_started: Regex,
    pub job_ended: Regex,
    pub job_ended_succeeded: Regex,
}

impl CompiledLogPatterns {
    pub fn compile(set: &RunnerLogPatternSet) -> Result<Self, PatternError> {
        Ok(Self {
            ready: compile_one("ready", &set.ready)?,
            job_started: compile_one("job_started", &set.job_started)?,
            job_ended: compile_one("job_ended", &set.job_ended)?,
            job_ended_succeeded: compile_one("job_ended_succeeded", &set.job_ended_succeeded)?,
        })
    }
}

fn compile_one(name: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_valid_set() {
        let set = RunnerLogPatternSet {
            ready: r"Listening for Jobs".to_string(),
            job_started: r"Running job: (?P<job>\w+)".to_string(),
            job_ended: r"Job succeeded|Job failed".to_string(),
            job_ended_succeeded: r"Job succeeded".to_string(),
        };
        assert!(CompiledLogPatterns::compile(&set).is_ok());
    }

    #[test]
    fn reports_which_pattern_was_malformed() {
        let set = RunnerLogPatternSet {
            ready: r"ok".to_string(),
            job_started: r"(unclosed".to_string(),
            job_ended: r"ok".to_string(),
            job_ended_succeeded: r"ok".to_string(),
        };
        let error = CompiledLogPatterns::compile(&set).expect_err("must fail");
        assert_eq!(error.name, "job_started");
    }
}
