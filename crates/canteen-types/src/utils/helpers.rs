//! Timestamp helpers.

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Returns 0 if the clock reads earlier than the epoch.
pub fn now_millis() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
