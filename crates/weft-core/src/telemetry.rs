// SPDX-License-Identifier: Apache-2.0

// Telemetry helpers for JSONL logging when the `telemetry` feature is enabled.
// Manually formats JSON to avoid a non-deterministic serde_json dependency.

use crate::ident::Hash;

#[inline]
fn short_id(h: &Hash) -> String {
    let mut short = [0u8; 8];
    short.copy_from_slice(&h[0..8]);
    hex::encode(short)
}

fn ts_micros() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}

/// Emits a state-discovery telemetry event during exploration.
///
/// Logs the state index and state hash (shortened) as a JSON line to stdout.
/// Best-effort: I/O errors are ignored and timestamps fall back to 0 on clock
/// errors.
pub fn state_discovered(state: usize, hash: &Hash) {
    use std::io::Write as _;
    let mut out = std::io::stdout().lock();
    let _ = write!(
        out,
        r#"{{"timestamp_micros":{},"event":"state","state":{},"hash_short":"{}"}}"#,
        ts_micros(),
        state,
        short_id(hash)
    );
    let _ = out.write_all(b"\n");
}

/// Emits a transition telemetry event when a rule application lands.
///
/// Logs source and target state indices plus the rule name as a JSON line to
/// stdout. The rule name is assumed free of JSON metacharacters; rule authors
/// control it. Best-effort: I/O errors are ignored.
pub fn transition(from: usize, to: usize, rule: &str) {
    use std::io::Write as _;
    let mut out = std::io::stdout().lock();
    let _ = write!(
        out,
        r#"{{"timestamp_micros":{},"event":"transition","from":{},"to":{},"rule":"{}"}}"#,
        ts_micros(),
        from,
        to,
        rule
    );
    let _ = out.write_all(b"\n");
}

/// Emits a summary telemetry event when exploration drains its work-list.
///
/// Logs total state and transition counts as a JSON line to stdout.
/// Best-effort: I/O errors are ignored.
pub fn done(states: usize, transitions: usize) {
    use std::io::Write as _;
    let mut out = std::io::stdout().lock();
    let _ = write!(
        out,
        r#"{{"timestamp_micros":{},"event":"done","states":{},"transitions":{}}}"#,
        ts_micros(),
        states,
        transitions
    );
    let _ = out.write_all(b"\n");
}
