//! In-memory batch queue that answers like a remote shell.
//!
//! Every command other than the status command is treated as a job
//! submission and answered with `Submitted batch job <id>`. The status
//! command lists the jobs currently marked running, one per line.

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{ChannelError, CommandChannel};

#[derive(Debug)]
struct QueueState {
    next_id: u64,
    running: BTreeSet<String>,
    sent: Vec<String>,
    fail_next: usize,
    connected: bool,
    omit_job_ids: bool,
    auto_run: bool,
    reject_submissions: bool,
}

/// Scripted `CommandChannel` for tests and demos.
#[derive(Debug)]
pub struct ScriptedChannel {
    status_command: String,
    latency: Duration,
    state: Mutex<QueueState>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedChannel {
    /// Create a queue that recognises `status_command` as the listing command.
    /// Job identifiers start at 100.
    pub fn new(status_command: impl Into<String>) -> Self {
        Self {
            status_command: status_command.into(),
            latency: Duration::ZERO,
            state: Mutex::new(QueueState {
                next_id: 100,
                running: BTreeSet::new(),
                sent: Vec::new(),
                fail_next: 0,
                connected: true,
                omit_job_ids: false,
                auto_run: false,
                reject_submissions: false,
            }),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Identifier handed to the next submission.
    pub fn with_first_id(self, id: u64) -> Self {
        self.state.lock().unwrap().next_id = id;
        self
    }

    /// Time each exchange takes, like a shell's settle delay.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Mark a job as running or finished in the queue listing.
    pub fn set_running(&self, job_id: &str, running: bool) {
        let mut state = self.state.lock().unwrap();
        if running {
            state.running.insert(job_id.to_string());
        } else {
            state.running.remove(job_id);
        }
    }

    /// Put every new submission straight into the running set.
    pub fn set_auto_run(&self, auto_run: bool) {
        self.state.lock().unwrap().auto_run = auto_run;
    }

    /// Reply to submissions without the `Submitted batch job` line.
    pub fn set_omit_job_ids(&self, omit: bool) {
        self.state.lock().unwrap().omit_job_ids = omit;
    }

    /// Fail every submission with a transport error; status polls still work.
    pub fn set_reject_submissions(&self, reject: bool) {
        self.state.lock().unwrap().reject_submissions = reject;
    }

    /// Fail the next `count` exchanges with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().unwrap().fail_next = count;
    }

    /// Close or reopen the session.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().unwrap().connected = connected;
    }

    /// Every command received, in order, including failed ones.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of received commands other than the status command.
    pub fn submissions(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .sent
            .iter()
            .filter(|c| **c != self.status_command)
            .count()
    }

    /// Number of received status commands.
    pub fn polls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .sent
            .iter()
            .filter(|c| **c == self.status_command)
            .count()
    }

    /// Highest number of exchanges that were in progress at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply(&self, command: &str) -> Result<String, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(command.to_string());

        if !state.connected {
            return Err(ChannelError::NotConnected);
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted transport failure",
            )));
        }

        if command == self.status_command {
            let mut listing = String::from(" JOBID   USER   ST  TIME\n");
            for id in &state.running {
                listing.push_str(&format!("  {}   user   R   0:05\n", id));
            }
            return Ok(listing);
        }

        if state.reject_submissions {
            return Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "scripted submission failure",
            )));
        }

        let id = state.next_id.to_string();
        state.next_id += 1;
        if state.auto_run {
            state.running.insert(id.clone());
        }
        if state.omit_job_ids {
            Ok(format!("{}\nsbatch: error: queue closed\n", command))
        } else {
            Ok(format!("{}\nSubmitted batch job {}\n", command, id))
        }
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn send(&self, command: &str) -> Result<String, ChannelError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.reply(command);

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}
