//! Persistent shell session over a child process.
//!
//! The session program (normally `ssh <host>`) is spawned once with piped
//! stdio. Each exchange writes one command line to stdin, waits for the
//! settle time and collects whatever stdout/stderr produced meanwhile.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use batch_types::ShellSettings;

use crate::{ChannelError, CommandChannel};

const READ_BUFFER_SIZE: usize = 2048;

struct Session {
    child: Child,
    stdin: ChildStdin,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    readers: Vec<JoinHandle<()>>,
}

/// Command channel backed by a long-lived shell process.
pub struct ShellChannel {
    program: String,
    settle: Duration,
    session: Mutex<Option<Session>>,
    connected: Arc<AtomicBool>,
}

impl ShellChannel {
    /// Spawn the session process described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Spawn` if the program cannot be started.
    pub async fn connect(settings: &ShellSettings) -> Result<Self, ChannelError> {
        let mut child = Command::new(&settings.program)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                program: settings.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ChannelError::NotConnected)?;
        let stdout = child.stdout.take().ok_or(ChannelError::NotConnected)?;
        let stderr = child.stderr.take().ok_or(ChannelError::NotConnected)?;

        let connected = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();

        let readers = vec![
            spawn_reader("stdout", stdout, tx.clone(), connected.clone()),
            spawn_reader("stderr", stderr, tx, connected.clone()),
        ];

        info!(
            program = %settings.program,
            args = ?settings.args,
            pid = ?child.id(),
            "Shell session opened"
        );

        Ok(Self {
            program: settings.program.clone(),
            settle: Duration::from_millis(settings.settle_ms),
            session: Mutex::new(Some(Session {
                child,
                stdin,
                output: rx,
                readers,
            })),
            connected,
        })
    }

    /// Close the session and terminate the process.
    ///
    /// Safe to call more than once.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut session) = session {
            if let Err(e) = session.child.kill().await {
                warn!(program = %self.program, error = %e, "Failed to kill shell session");
            }
            for reader in session.readers {
                reader.abort();
            }
            info!(program = %self.program, "Shell session closed");
        }
    }
}

#[async_trait]
impl CommandChannel for ShellChannel {
    async fn send(&self, command: &str) -> Result<String, ChannelError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ChannelError::NotConnected)?;
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::NotConnected);
        }

        let mut stale = 0usize;
        while let Ok(chunk) = session.output.try_recv() {
            stale += chunk.len();
        }
        if stale > 0 {
            debug!(bytes = stale, "Discarded output received between commands");
        }

        if let Err(e) = write_line(&mut session.stdin, command).await {
            warn!(program = %self.program, error = %e, "Shell session stdin closed");
            self.connected.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        tokio::time::sleep(self.settle).await;

        let mut bytes = Vec::new();
        while let Ok(chunk) = session.output.try_recv() {
            bytes.extend_from_slice(&chunk);
        }

        debug!(command, bytes = bytes.len(), "Command exchange complete");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn write_line(stdin: &mut ChildStdin, command: &str) -> std::io::Result<()> {
    stdin.write_all(format!("{}\n", command).as_bytes()).await?;
    stdin.flush().await
}

fn spawn_reader<R>(
    stream: &'static str,
    mut reader: R,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => {
                    debug!(stream, "Shell stream closed");
                    break;
                }
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(stream, error = %e, "Shell stream read failed");
                    break;
                }
            }
        }
        connected.store(false, Ordering::SeqCst);
    })
}
