//! Process-level tests for the `bootstrap` binary.

mod helpers;

use helpers::fake_host::{CannedResponse, FakeHost, unreachable_endpoint};
use serde_json::json;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const EXIT_TIMEOUT: Duration = Duration::from_secs(20);

/// `bootstrap` with a clean runtime environment.
fn bootstrap() -> Command {
    // `CARGO_BIN_EXE_bootstrap` is set by Cargo's test harness for integration tests.
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootstrap"));
    cmd.env_remove("AWS_LAMBDA_RUNTIME_API")
        .env_remove("LAMBDA_HANDLER")
        .env_remove("LAMBDA_RUNTIME_DEBUG")
        .env_remove("LAMBDA_RUNTIME_SEND_TIMEOUT_MS")
        .env_remove("LAMBDA_RUNTIME_CONFIG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Wait for the child to exit, killing it if it takes too long.
fn wait_for_exit(mut child: Child) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("Failed to poll bootstrap") {
            return status;
        }
        if start.elapsed() > EXIT_TIMEOUT {
            let _ = child.kill();
            panic!("bootstrap did not exit within {:?}", EXIT_TIMEOUT);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Run a long-lived bootstrap to completion, discarding its output.
fn run_to_exit(cmd: &mut Command) -> ExitStatus {
    let child = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn bootstrap binary");
    wait_for_exit(child)
}

#[test]
fn exits_non_zero_without_endpoint() {
    let output = bootstrap().output().expect("Failed to run bootstrap");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("AWS_LAMBDA_RUNTIME_API"),
        "stderr should name the missing variable: {}",
        stderr
    );
}

#[test]
fn exits_non_zero_when_host_is_unreachable() {
    let status = run_to_exit(bootstrap().env("AWS_LAMBDA_RUNTIME_API", unreachable_endpoint()));

    assert_eq!(status.code(), Some(1));
}

#[test]
fn exits_non_zero_for_unknown_handler() {
    let host = FakeHost::serve(vec![]);

    let output = bootstrap()
        .env("AWS_LAMBDA_RUNTIME_API", host.endpoint())
        .env("LAMBDA_HANDLER", "no-such-handler")
        .output()
        .expect("Failed to run bootstrap");
    let requests = host.finish();

    assert_eq!(output.status.code(), Some(1));
    assert!(requests.is_empty(), "nothing may be fetched before a handler resolves");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no-such-handler"), "stderr: {}", stderr);
}

#[test]
fn lists_registered_handlers() {
    let output = bootstrap()
        .arg("--list-handlers")
        .output()
        .expect("Failed to run bootstrap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["function", "handler"]);
}

#[test]
fn serves_invocations_until_host_goes_away() {
    let health = json!({
        "version": "2.0",
        "rawPath": "/health",
        "rawQueryString": "",
        "headers": { "accept": "application/json" },
        "requestContext": { "http": { "method": "GET", "path": "/health" } },
        "isBase64Encoded": false
    });
    let missing = json!({
        "rawPath": "/missing",
        "requestContext": { "http": { "method": "GET" } }
    });
    let host = FakeHost::serve(vec![
        CannedResponse::invocation("req-1", &health),
        CannedResponse::accepted(),
        CannedResponse::invocation("req-2", &missing),
        CannedResponse::accepted(),
    ]);

    let status = run_to_exit(bootstrap().env("AWS_LAMBDA_RUNTIME_API", host.endpoint()));
    let requests = host.finish();

    assert_eq!(status.code(), Some(1), "exits once fetching fails");
    assert_eq!(requests.len(), 4);

    assert_eq!(requests[1].path, "/2018-06-01/runtime/invocation/req-1/response");
    let first = requests[1].json();
    assert_eq!(first["statusCode"], 200);
    assert_eq!(first["isBase64Encoded"], false);
    assert_eq!(first["headers"]["content-type"], "application/json");
    let body: serde_json::Value =
        serde_json::from_str(first["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["status"], "healthy");

    assert_eq!(requests[3].path, "/2018-06-01/runtime/invocation/req-2/response");
    assert_eq!(requests[3].json()["statusCode"], 404);
}

#[test]
fn raw_handler_runs_from_command_line_flag() {
    let host = FakeHost::serve(vec![
        CannedResponse::invocation("req-raw", &json!({ "source": "aws.events" })),
        CannedResponse::accepted(),
    ]);

    let status = run_to_exit(
        bootstrap()
            .args(["--handler", "function", "--runtime-api", host.endpoint()])
            .env("LAMBDA_RUNTIME_DEBUG", "1"),
    );
    let requests = host.finish();

    assert_eq!(status.code(), Some(1));
    assert_eq!(requests.len(), 2);
    let result = requests[1].json();
    assert_eq!(result["statusCode"], 200);
    assert_eq!(result["message"], "Function handler response");
    assert_eq!(result["requestId"], "req-raw");
}
