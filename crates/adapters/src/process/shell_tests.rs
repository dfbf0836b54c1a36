// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use std::time::Duration;

fn request(command: &str) -> SpawnRequest {
    SpawnRequest {
        resource_id: ResourceId::new("test"),
        generation: Generation(1),
        command: command.to_string(),
        cwd: std::env::temp_dir(),
        env: vec![],
    }
}

/// Collect output until the exit event arrives.
async fn run_to_exit(rx: &mut mpsc::Receiver<Event>) -> (String, Option<i32>) {
    let mut output = String::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for process events")
            .expect("event channel closed");
        match event {
            Event::ProcessOutput { chunk, .. } => output.push_str(&chunk),
            Event::ProcessExited { exit_code, .. } => return (output, exit_code),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn forwards_stdout_stderr_and_exit_code() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);

    let handle = adapter
        .spawn(request("echo hello; echo oops >&2; exit 3"), tx)
        .await
        .unwrap();
    assert!(handle.pid.is_some());

    let (output, code) = run_to_exit(&mut rx).await;
    assert!(output.contains("hello"), "output: {output}");
    assert!(output.contains("oops"), "output: {output}");
    assert_eq!(code, Some(3));
}

#[tokio::test]
async fn events_carry_resource_and_generation() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);
    let mut req = request("echo tagged");
    req.generation = Generation(7);

    adapter.spawn(req, tx).await.unwrap();

    let first = rx.recv().await.unwrap();
    match first {
        Event::ProcessOutput {
            resource_id,
            generation,
            ..
        } => {
            assert_eq!(resource_id, "test");
            assert_eq!(generation, Generation(7));
        }
        other => panic!("expected output first, got {:?}", other),
    }
}

#[tokio::test]
async fn passes_environment() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);
    let mut req = request("echo \"value=$VIGIL_TEST_VAR\"");
    req.env = vec![("VIGIL_TEST_VAR".to_string(), "42".to_string())];

    adapter.spawn(req, tx).await.unwrap();

    let (output, code) = run_to_exit(&mut rx).await;
    assert!(output.contains("value=42"), "output: {output}");
    assert_eq!(code, Some(0));
}

#[tokio::test]
async fn kill_terminates_with_signal_exit() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);

    let handle = adapter.spawn(request("sleep 30"), tx).await.unwrap();
    assert_eq!(adapter.live_count(), 1);

    adapter.kill(&handle).await.unwrap();

    let (_, code) = run_to_exit(&mut rx).await;
    assert_eq!(code, None);
    assert_eq!(adapter.live_count(), 0);
}

#[tokio::test]
async fn kill_after_exit_reports_not_found() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);

    let handle = adapter.spawn(request("true"), tx).await.unwrap();
    run_to_exit(&mut rx).await;

    let err = adapter.kill(&handle).await.unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(_)));
}

#[tokio::test]
async fn missing_cwd_is_a_spawn_error() {
    let adapter = ShellProcessAdapter::new();
    let (tx, _rx) = mpsc::channel(64);
    let mut req = request("true");
    req.cwd = PathBuf::from("/definitely/not/a/real/dir");

    let err = adapter.spawn(req, tx).await.unwrap_err();
    assert!(matches!(err, ProcessError::SpawnFailed(_)));
}

#[tokio::test]
async fn runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(64);
    let mut req = request("touch started && ls");
    req.cwd = dir.path().to_path_buf();

    adapter.spawn(req, tx).await.unwrap();

    let (output, code) = run_to_exit(&mut rx).await;
    assert_eq!(code, Some(0));
    assert!(output.contains("started"), "output: {output}");
    assert!(dir.path().join("started").exists());
}

#[test]
fn chunker_holds_back_a_split_character() {
    let mut chunker = Utf8Chunker::default();
    let euro = "€".as_bytes();

    assert_eq!(chunker.push(&[b'a', euro[0], euro[1]]), "a");
    assert_eq!(chunker.push(&[euro[2], b'b']), "€b");
    assert_eq!(chunker.finish(), "");
    assert!(chunker.is_finished());
}

#[test]
fn chunker_flushes_a_dangling_partial_character() {
    let mut chunker = Utf8Chunker::default();
    assert_eq!(chunker.push(&[b'x', 0xC3]), "x");
    assert_eq!(chunker.finish(), "\u{FFFD}");
}

#[test]
fn chunker_replaces_invalid_bytes() {
    let mut chunker = Utf8Chunker::default();
    assert_eq!(chunker.push(&[b'o', 0xFF, b'k']), "o\u{FFFD}k");
}

#[yare::parameterized(
    ascii        = { b"abc",              0 },
    complete     = { "é".as_bytes(),      0 },
    two_of_three = { &[0xE2, 0x82],       2 },
    one_of_four  = { &[b'a', 0xF0],       1 },
    three_of_four = { &[0xF0, 0x9F, 0x98], 3 },
)]
fn incomplete_tail_length(bytes: &[u8], expected: usize) {
    assert_eq!(incomplete_tail(bytes), expected);
}

#[tokio::test]
async fn multibyte_output_survives_read_boundaries() {
    let adapter = ShellProcessAdapter::new();
    let (tx, mut rx) = mpsc::channel(256);
    let req = request("i=0; while [ $i -lt 3000 ]; do printf '€'; i=$((i+1)); done");

    adapter.spawn(req, tx).await.unwrap();

    let (output, code) = run_to_exit(&mut rx).await;
    assert_eq!(code, Some(0));
    assert!(!output.contains('\u{FFFD}'));
    assert_eq!(output.chars().filter(|c| *c == '€').count(), 3000);
}
