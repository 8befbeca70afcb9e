//! Parsers for batch queue output.
//!
//! Both parsers are total: output without a match is valid data (no
//! identifier, empty running set), never an error.

use std::collections::HashSet;

/// Prefix of the line a queue prints after accepting a job.
pub const SUBMIT_MARKER: &str = "Submitted batch job";

/// What a submission's output says about the queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The queue accepted the job under this identifier.
    Accepted(String),
    /// No `Submitted batch job` line was found.
    NoIdentifier,
}

impl SubmitOutcome {
    /// Parse submission output.
    pub fn from_output(output: &str) -> Self {
        match parse_job_id(output) {
            Some(id) => SubmitOutcome::Accepted(id),
            None => SubmitOutcome::NoIdentifier,
        }
    }

    /// The identifier, if one was assigned.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Accepted(id) => Some(id),
            SubmitOutcome::NoIdentifier => None,
        }
    }
}

/// Extract the job identifier from submission output.
///
/// The first line whose trimmed text starts with [`SUBMIT_MARKER`] wins;
/// the identifier is its last whitespace-separated token.
///
/// ```
/// use batch_orchestrator::parse_job_id;
///
/// assert_eq!(parse_job_id("Submitted batch job 482\n"), Some("482".to_string()));
/// assert_eq!(parse_job_id("sbatch: error: invalid partition"), None);
/// ```
pub fn parse_job_id(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(SUBMIT_MARKER))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

/// Extract the identifiers of running jobs from a queue listing.
///
/// A running-job line is one whose trimmed text is one or more decimal
/// digits followed by whitespace; its first token is the identifier.
/// Headers and anything else are ignored.
pub fn parse_running_jobs(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(running_job_id)
        .map(str::to_string)
        .collect()
}

fn running_job_id(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    if line[digits..].starts_with(char::is_whitespace) {
        Some(&line[..digits])
    } else {
        None
    }
}
