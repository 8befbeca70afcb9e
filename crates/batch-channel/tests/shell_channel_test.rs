//! Shell session tests against a local `sh`.

#![cfg(unix)]

use std::time::Duration;

use batch_channel::{ChannelError, CommandChannel, ShellChannel};
use batch_types::ShellSettings;

fn local_shell() -> ShellSettings {
    ShellSettings {
        program: "sh".to_string(),
        args: Vec::new(),
        settle_ms: 300,
    }
}

#[tokio::test]
async fn test_send_captures_output() {
    let channel = ShellChannel::connect(&local_shell()).await.unwrap();
    assert!(channel.is_connected());

    let output = channel.send("echo Submitted batch job 482").await.unwrap();
    assert!(output.contains("Submitted batch job 482"));

    channel.disconnect().await;
}

#[tokio::test]
async fn test_exchanges_do_not_leak_into_each_other() {
    let channel = ShellChannel::connect(&local_shell()).await.unwrap();

    let first = channel.send("echo first").await.unwrap();
    let second = channel.send("echo second").await.unwrap();

    assert!(first.contains("first"));
    assert!(!second.contains("first"));
    assert!(second.contains("second"));

    channel.disconnect().await;
}

#[tokio::test]
async fn test_stderr_is_captured() {
    let channel = ShellChannel::connect(&local_shell()).await.unwrap();

    let output = channel.send("echo queue-error 1>&2").await.unwrap();
    assert!(output.contains("queue-error"));

    channel.disconnect().await;
}

#[tokio::test]
async fn test_send_after_disconnect_fails() {
    let channel = ShellChannel::connect(&local_shell()).await.unwrap();
    channel.disconnect().await;
    channel.disconnect().await;

    assert!(!channel.is_connected());
    let result = channel.send("echo hello").await;
    assert!(matches!(result, Err(ChannelError::NotConnected)));
}

#[tokio::test]
async fn test_remote_exit_closes_channel() {
    let channel = ShellChannel::connect(&local_shell()).await.unwrap();

    let _ = channel.send("exit").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!channel.is_connected());
    assert!(channel.send("echo hello").await.is_err());
}

#[tokio::test]
async fn test_closed_stdin_closes_channel() {
    // The shell stays alive with stdout open but stops reading commands
    let settings = ShellSettings {
        args: vec!["-c".to_string(), "exec 0<&-; sleep 30".to_string()],
        ..local_shell()
    };
    let channel = ShellChannel::connect(&settings).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(channel.is_connected());

    let result = channel.send("echo hello").await;
    assert!(matches!(result, Err(ChannelError::Io(_))));
    assert!(!channel.is_connected());
    assert!(matches!(
        channel.send("echo hello").await,
        Err(ChannelError::NotConnected)
    ));

    channel.disconnect().await;
}

#[tokio::test]
async fn test_connect_unknown_program_fails() {
    let settings = ShellSettings {
        program: "/nonexistent/batch-relay-shell".to_string(),
        ..local_shell()
    };

    let result = ShellChannel::connect(&settings).await;
    assert!(matches!(result, Err(ChannelError::Spawn { .. })));
}
