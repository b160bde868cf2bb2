#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use doeprims::frame::{FrameConfig, StreamMailbox};
use doeprims::mux::{DoeRequester, PciProtocol};
use doeprims::transport::{MailboxStream, UnixDomainSocket};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/doecli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn spawn_echo(sock_path: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("--log-level")
        .arg("error")
        .arg("echo")
        .arg(sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo command should start")
}

fn wait_for_connect(path: &Path, timeout: Duration) -> MailboxStream {
    let start = Instant::now();
    loop {
        match UnixDomainSocket::connect(path) {
            Ok(stream) => return stream,
            Err(err) => {
                if start.elapsed() >= timeout {
                    panic!("connect timeout: {err}");
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn test_config() -> FrameConfig {
    FrameConfig {
        read_timeout: Some(Duration::from_secs(3)),
        write_timeout: Some(Duration::from_secs(3)),
        ..FrameConfig::default()
    }
}

#[test]
fn echo_responder_answers_discovery_and_spdm() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("doe.sock");
    let mut child = spawn_echo(&sock_path);

    let stream = wait_for_connect(&sock_path, Duration::from_secs(3));
    let mailbox = StreamMailbox::from_stream(stream, test_config()).expect("mailbox setup");
    let mut requester = DoeRequester::new(mailbox);

    let registry = requester.discover().expect("discovery should succeed");
    assert_eq!(registry.len(), 3);

    let reply = requester
        .exchange_spdm(&[0x12, 0x84, 0x00, 0x00])
        .expect("SPDM echo should succeed");
    assert_eq!(reply.as_ref(), &[0x12, 0x84, 0x00, 0x00]);

    let reply = requester
        .exchange_secured_spdm(&[0xA5; 16])
        .expect("secured SPDM echo should succeed");
    assert_eq!(reply.as_ref(), &[0xA5; 16]);

    let message = requester
        .exchange_vendor(PciProtocol::IdeKm, &[0x00, 0x01])
        .expect("vendor echo should succeed");
    assert_eq!(message.protocol(), PciProtocol::IdeKm);
    assert_eq!(message.payload.as_ref(), &[0x00, 0x01]);

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn discover_command_prints_registry_json() {
    let dir = unique_temp_dir("discover");
    let sock_path = dir.join("doe.sock");
    let mut child = spawn_echo(&sock_path);

    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("discover")
        .arg(&sock_path)
        .arg("--timeout")
        .arg("3s")
        .output()
        .expect("discover should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("discovery.schema.json"));
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("discover should emit json");
    let names: Vec<&str> = payload["entries"]
        .as_array()
        .expect("entries should be an array")
        .iter()
        .filter_map(|e| e["type_name"].as_str())
        .collect();
    assert_eq!(names, vec!["DISCOVERY", "SPDM", "SECURED_SPDM"]);

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_command_round_trips_payload() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("doe.sock");
    let mut child = spawn_echo(&sock_path);

    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock_path)
        .arg("--hex")
        .arg("1284 0000")
        .output()
        .expect("send should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value = serde_json::from_str(stdout.trim()).expect("json output");
    assert_eq!(payload["type_name"], "SPDM");
    assert_eq!(payload["payload"], "12840000");

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn discover_missing_socket_times_out_with_124() {
    let missing = PathBuf::from(format!(
        "/tmp/doecli-missing-{}-{}.sock",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));

    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("discover")
        .arg(&missing)
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("discover should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn decode_command_reports_unknown_objects() {
    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg("010000000300000000000000 0100330003000000deadbeef")
        .output()
        .expect("decode should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type_name"], "DISCOVERY");
    assert!(lines[0].get("error").is_none());
    assert_eq!(lines[1]["data_object_type"], 0x33);
    assert!(lines[1]["error"]
        .as_str()
        .is_some_and(|e| e.contains("unsupported")));
}

#[test]
fn decode_rejects_bad_hex_with_usage_code() {
    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("decode")
        .arg("not-hex")
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_doeprims"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("doeprims {}", env!("CARGO_PKG_VERSION"))
    );
}
