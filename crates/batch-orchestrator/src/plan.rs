//! Turning a total run time into equal queue segments.
//!
//! A user asks for a total number of minutes split into N segments. Each
//! segment gets `total / N` minutes (integer division), and the command's
//! `-maxtime` limit is rewritten to match so the queue stops the segment
//! when its budget is spent.

use crate::OrchestratorError;

const MAXTIME_FLAG: &str = "-maxtime ";

/// A validated request to run `command` as `segments` consecutive jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Command with its time limit set to `segment_minutes`.
    pub command: String,
    pub total_minutes: u32,
    pub segments: u32,
    pub segment_minutes: u32,
}

impl SegmentPlan {
    /// Default command template for launching `path` on one process.
    pub fn default_command(path: &str) -> String {
        format!("mqrun -np 1 -maxtime 30 {}", path)
    }

    /// Build a plan from numeric values.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::InvalidInput` if the template is blank,
    /// either number is zero, or a segment would be shorter than a minute.
    pub fn new(template: &str, total_minutes: u32, segments: u32) -> Result<Self, OrchestratorError> {
        if template.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "command must not be empty".to_string(),
            ));
        }
        if total_minutes == 0 {
            return Err(OrchestratorError::InvalidInput(
                "total minutes must be > 0".to_string(),
            ));
        }
        if segments == 0 {
            return Err(OrchestratorError::InvalidInput(
                "segments must be > 0".to_string(),
            ));
        }

        let segment_minutes = total_minutes / segments;
        if segment_minutes == 0 {
            return Err(OrchestratorError::InvalidInput(format!(
                "{} minutes cannot be split into {} segments of at least one minute",
                total_minutes, segments
            )));
        }

        Ok(Self {
            command: rewrite_maxtime(template, segment_minutes),
            total_minutes,
            segments,
            segment_minutes,
        })
    }

    /// Build a plan from raw text fields as typed by a user.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::InvalidInput` naming the field that is
    /// not a positive integer, or any error from [`SegmentPlan::new`].
    pub fn from_fields(
        template: &str,
        total_minutes: &str,
        segments: &str,
    ) -> Result<Self, OrchestratorError> {
        let total_minutes = parse_field("total minutes", total_minutes)?;
        let segments = parse_field("segments", segments)?;
        Self::new(template, total_minutes, segments)
    }
}

fn parse_field(name: &str, value: &str) -> Result<u32, OrchestratorError> {
    value.trim().parse::<u32>().map_err(|_| {
        OrchestratorError::InvalidInput(format!(
            "{} must be a positive integer, got '{}'",
            name,
            value.trim()
        ))
    })
}

/// Replace the number after the first `-maxtime ` that has one.
fn rewrite_maxtime(template: &str, minutes: u32) -> String {
    for (index, _) in template.match_indices(MAXTIME_FLAG) {
        let value_start = index + MAXTIME_FLAG.len();
        let rest = &template[value_start..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            return format!("{}{}{}", &template[..value_start], minutes, &rest[digits..]);
        }
    }
    template.to_string()
}
