// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Failure-reason extraction from terraform stderr.
//!
//! Best-effort heuristic classifier over free-form tool output, kept behind
//! this module so it can be swapped for structured-output parsing if the
//! tool grows a machine-readable error channel. The extracted reason (never
//! the raw dump) is what lands in the persisted status record.

/// Markers that introduce a human-readable failure line.
const FAILURE_MARKERS: [&str; 3] = ["error:", "failed:", "fatal:"];

/// Structured-log level tags that mark a line as diagnostic noise.
const LOG_LEVEL_TAGS: [&str; 5] = ["[TRACE]", "[DEBUG]", "[INFO]", "[WARN]", "[ERROR]"];

/// Extract a concise failure reason from stderr.
///
/// Scans line by line for a failure marker, skipping structured-logging
/// noise (level tags, timestamped lines). Falls back to a generic message
/// naming the exit code when no marker line is found.
pub fn extract_failure_reason(stderr: &str, exit_code: i32) -> String {
    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() || is_log_noise(line) {
            continue;
        }
        let lowered = line.to_lowercase();
        for marker in FAILURE_MARKERS {
            if let Some(idx) = lowered.find(marker) {
                let reason = line[idx + marker.len()..].trim();
                if !reason.is_empty() {
                    return reason.to_string();
                }
            }
        }
    }
    format!("command failed with return code {exit_code}")
}

fn is_log_noise(line: &str) -> bool {
    if LOG_LEVEL_TAGS.iter().any(|tag| line.contains(tag)) {
        return true;
    }
    starts_with_timestamp(line)
}

/// Matches the `YYYY-MM-DDTHH:MM` prefix terraform's TF_LOG output carries.
fn starts_with_timestamp(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 16
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && (bytes[10] == b'T' || bytes[10] == b' ')
}
