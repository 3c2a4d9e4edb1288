#![cfg(not(loom))]

use std::net::{Ipv4Addr, TcpListener};
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_tournament");

fn summary(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(stdout.trim()).unwrap()
}

fn free_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn single_process_json_summary() {
    let output = Command::new(BIN)
        .args(["6", "50", "--json", "--log", "warn"])
        .output()
        .unwrap();
    let json = summary(&output);
    assert_eq!(json["threads"], 6);
    assert_eq!(json["barriers"], 50);
    assert_eq!(json["num_rounds"], 3);
    assert_eq!(json["group_size"], 1);
}

#[test]
fn zero_threads_fails() {
    let output = Command::new(BIN).args(["0", "10"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("participant count"), "stderr: {stderr}");
}

#[test]
fn group_without_coordinator_fails() {
    let output = Command::new(BIN)
        .args(["2", "10", "--group-size", "2"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn empty_group_fails() {
    let output = Command::new(BIN)
        .args(["2", "10", "--group-size", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--group-size must be at least 1"), "stderr: {stderr}");
}

#[test]
fn coordinator_without_group_fails() {
    let output = Command::new(BIN)
        .args(["2", "10", "--coordinator", "127.0.0.1:9"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--coordinator needs"), "stderr: {stderr}");
}

#[test]
fn two_processes_rendezvous_over_tcp() {
    let coordinator = format!("127.0.0.1:{}", free_port());
    let spawn = |rank: &str| {
        Command::new(BIN)
            .args(["3", "100", "--json", "--log", "warn", "--group-size", "2"])
            .args(["--rank", rank, "--coordinator", coordinator.as_str()])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap()
    };

    // The peer starts first and retries until rank 0 is listening.
    let peer = spawn("1");
    let root = spawn("0");

    let root = summary(&root.wait_with_output().unwrap());
    let peer = summary(&peer.wait_with_output().unwrap());
    assert_eq!(root["rank"], 0);
    assert_eq!(peer["rank"], 1);
    assert_eq!(root["group_size"], 2);
    assert_eq!(peer["group_size"], 2);
}
