//! Line commands for the interactive session.
//!
//! Parsing is kept apart from execution so the command grammar can be
//! tested without a terminal.

use batch_orchestrator::{Job, JobKey, JobOrchestrator, SegmentPlan};

pub const HELP: &str = "\
Commands:
  submit <total-minutes> <segments> <command...>   start a segmented job
  list                                             show active jobs
  forget <key>                                     drop a failed job
  template <path>                                  print the default command
  help                                             show this text
  quit                                             shut down and exit";

/// One parsed session line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Submit {
        total_minutes: String,
        segments: String,
        command: String,
    },
    List,
    Forget(String),
    Template(String),
    Help,
    Quit,
    Empty,
}

impl SessionCommand {
    /// Parse one input line.
    ///
    /// Numbers are left as text; `SegmentPlan::from_fields` validates them
    /// so its messages name the offending field.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(SessionCommand::Empty);
        };

        match verb {
            "submit" => {
                let (Some(total_minutes), Some(segments)) = (words.next(), words.next()) else {
                    return Err("usage: submit <total-minutes> <segments> <command...>".into());
                };
                let command = words.collect::<Vec<_>>().join(" ");
                if command.is_empty() {
                    return Err("submit needs a command".into());
                }
                Ok(SessionCommand::Submit {
                    total_minutes: total_minutes.to_string(),
                    segments: segments.to_string(),
                    command,
                })
            }
            "list" | "ls" => Ok(SessionCommand::List),
            "forget" => words
                .next()
                .map(|key| SessionCommand::Forget(key.to_string()))
                .ok_or_else(|| "usage: forget <key>".to_string()),
            "template" => words
                .next()
                .map(|path| SessionCommand::Template(path.to_string()))
                .ok_or_else(|| "usage: template <path>".to_string()),
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" => Ok(SessionCommand::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

/// What the loop should do after a command ran.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

/// Run a parsed command against the orchestrator.
pub async fn execute(orchestrator: &JobOrchestrator, command: SessionCommand) -> Reply {
    match command {
        SessionCommand::Submit {
            total_minutes,
            segments,
            command,
        } => {
            let plan = match SegmentPlan::from_fields(&command, &total_minutes, &segments) {
                Ok(plan) => plan,
                Err(e) => return Reply::Print(format!("error: {}", e)),
            };
            match orchestrator.submit_plan(&plan).await {
                Ok(key) => Reply::Print(format!(
                    "submitted {}: {} x {} min: {}",
                    key, plan.segments, plan.segment_minutes, plan.command
                )),
                Err(e) => Reply::Print(format!("error: {}", e)),
            }
        }
        SessionCommand::List => Reply::Print(format_jobs(&orchestrator.list())),
        SessionCommand::Forget(text) => match text.parse::<JobKey>() {
            Ok(key) if orchestrator.forget(key) => Reply::Print(format!("forgot {}", key)),
            Ok(key) => Reply::Print(format!("{} is not a failed job", key)),
            Err(_) => Reply::Print(format!("error: '{}' is not a job key", text)),
        },
        SessionCommand::Template(path) => Reply::Print(SegmentPlan::default_command(&path)),
        SessionCommand::Help => Reply::Print(HELP.to_string()),
        SessionCommand::Quit => Reply::Quit,
        SessionCommand::Empty => Reply::Print(String::new()),
    }
}

/// Render the job table, one job per line.
pub fn format_jobs(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return "No active jobs".to_string();
    }
    jobs.iter()
        .map(|job| job.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
