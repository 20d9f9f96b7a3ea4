//! Debug timing records.
//!
//! Records go to the `lambda_runtime_bridge::telemetry` log target (stderr in
//! the bootstrap binary), never to the invocation's result.

use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;

pub const TELEMETRY_TARGET: &str = "lambda_runtime_bridge::telemetry";

/// Per-phase durations of one invocation, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_request_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_response_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<f64>,
}

impl Timings {
    /// Run `f`, storing its duration in `slot`.
    pub fn measure<T>(slot: &mut Option<f64>, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        *slot = Some(millis(start.elapsed()));
        value
    }
}

/// Duration in milliseconds, rounded to microsecond precision.
pub fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1_000_000.0).round() / 1_000.0
}

/// Resident and peak memory of this process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub memory_mb: f64,
    pub peak_memory_mb: f64,
}

/// Read memory usage from `/proc/self/status`; `None` where that is unavailable.
pub fn memory_usage() -> Option<MemoryUsage> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_proc_status(&status)
}

fn parse_proc_status(status: &str) -> Option<MemoryUsage> {
    let kib = |key: &str| -> Option<f64> {
        status
            .lines()
            .find_map(|line| line.strip_prefix(key))?
            .trim()
            .trim_end_matches("kB")
            .trim()
            .parse::<f64>()
            .ok()
    };
    let to_mb = |kib: f64| (kib / 1024.0 * 100.0).round() / 100.0;

    Some(MemoryUsage {
        memory_mb: to_mb(kib("VmRSS:")?),
        peak_memory_mb: to_mb(kib("VmHWM:")?),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Record<'a> {
    request_id: &'a str,
    #[serde(flatten)]
    timings: &'a Timings,
    #[serde(flatten)]
    memory: Option<MemoryUsage>,
}

/// Emit one structured record for a finished invocation.
pub fn emit(request_id: &str, timings: &Timings, memory: Option<MemoryUsage>) {
    let record = Record {
        request_id,
        timings,
        memory,
    };
    match serde_json::to_string(&record) {
        Ok(json) => debug!(target: TELEMETRY_TARGET, "{}", json),
        Err(e) => debug!(target: TELEMETRY_TARGET, "Failed to encode telemetry: {}", e),
    }
}
