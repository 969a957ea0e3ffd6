use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("sqwclock-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    dir.join(format!("{}-{}.{}", prefix, nonce, ext))
}

fn write_temp_file(prefix: &str, contents: &str) -> PathBuf {
    let path = temp_path(prefix, "yaml");
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

fn sqwclock(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_sqwclock"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_cli_help() {
    let output = sqwclock(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("SqwClock"));
    assert!(stdout.contains("--duration-ms"));
}

#[test]
fn test_cli_default_run_prints_ticks() {
    let output = sqwclock(&["--duration-ms", "2100", "--start", "10:00:00"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("RTC SQW 1Hz timer demo"));
    assert!(stdout.contains("SQW tick: LED on, seconds = "));
    assert!(stdout.contains("SQW tick: LED off, seconds = "));
    assert!(stdout.contains("seconds = 0"));
}

#[test]
fn test_cli_no_uart_stdout() {
    let output = sqwclock(&["--duration-ms", "1200", "--no-uart-stdout"]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_trace_logs_compare_match_dispatch() {
    let output = sqwclock(&["--trace", "--duration-ms", "1100", "--no-uart-stdout"]);

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("_COMPA (vector "));
}

#[test]
fn test_cli_halted_rtc_is_started() {
    let output = sqwclock(&["--duration-ms", "300", "--halted"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("RTC is NOT running"));
}

#[test]
fn test_cli_script_pass_writes_snapshot() {
    let script = write_temp_file(
        "script-pass",
        r#"
schema_version: "1.0"
board:
  rtc:
    start: "23:59:58"
  uart_echo: false
limits:
  duration_ms: 3000
assertions:
  - uart_contains: "seconds = "
  - min_ticks: 2
  - max_ticks: 3
"#,
    );
    let snapshot_path = temp_path("snapshot", "json");

    let output = sqwclock(&[
        "--script",
        script.to_str().unwrap(),
        "--snapshot",
        snapshot_path.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert!(snapshot_path.exists());

    let content = std::fs::read_to_string(&snapshot_path).unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(snapshot["type"], "sqwclock_board");
    assert_eq!(snapshot["now_ms"], 3000);
    assert_eq!(snapshot["rtc"]["time"], "00:00:01");
    assert!(snapshot["sketch"]["ticks"].as_u64().unwrap() >= 2);
    assert!(snapshot["uart_lines"].as_array().unwrap().len() > 3);

    let _ = std::fs::remove_file(&snapshot_path);
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_cli_script_assertion_fail() {
    let script = write_temp_file(
        "script-fail",
        r#"
schema_version: "1.0"
board:
  uart_echo: false
limits:
  duration_ms: 1500
assertions:
  - uart_contains: "ThisTextWillNeverBeFound"
"#,
    );

    let output = sqwclock(&["--script", script.to_str().unwrap()]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1)); // EXIT_ASSERT_FAIL
}

#[test]
fn test_cli_tick_bounds_fail() {
    let script = write_temp_file(
        "script-ticks",
        r#"
schema_version: "1.0"
limits:
  duration_ms: 500
assertions:
  - min_ticks: 5
"#,
    );

    let output = sqwclock(&["--script", script.to_str().unwrap(), "--no-uart-stdout"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_duration_guard() {
    let output = sqwclock(&["--duration-ms", "100000000"]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR
}

#[test]
fn test_cli_bad_schema_version() {
    let script = write_temp_file(
        "script-version",
        r#"
schema_version: "9.9"
limits:
  duration_ms: 10
"#,
    );

    let output = sqwclock(&["--script", script.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("schema_version"));
}

#[test]
fn test_cli_missing_script() {
    let output = sqwclock(&["--script", "non_existent_script.yaml"]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_rejects_bad_start_time() {
    let output = sqwclock(&["--start", "25:00:00"]);

    // Rejected by argument parsing, which exits with the usage error code
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_board_config_file() {
    let config = write_temp_file(
        "board",
        r#"
rtc:
  start: "12:30:45"
  halted: true
"#,
    );

    let output = sqwclock(&[
        "--config",
        config.to_str().unwrap(),
        "--duration-ms",
        "250",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("RTC is NOT running"));
    assert!(stdout.contains("seconds = 45"));

    let _ = std::fs::remove_file(&config);
}

#[test]
fn test_cli_board_config_unknown_field() {
    let config = write_temp_file("board-bad", "rtc:\n  speed: 2\n");

    let output = sqwclock(&["--config", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));

    let _ = std::fs::remove_file(&config);
}
