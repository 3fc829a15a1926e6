//! Metadata version assignment.

use chrono::Utc;

/// Next metadata version after `previous`.
///
/// Versions are millisecond timestamps, forced strictly above the previous
/// value so two bumps inside the same millisecond (or a clock step backwards)
/// still produce increasing versions.
pub fn next_version(previous: Option<u64>) -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    match previous {
        Some(prev) => now.max(prev.saturating_add(1)),
        None => now.max(1),
    }
}
