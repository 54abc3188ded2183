//! String formatting for log output.

/// Shortens a record id for log lines: the first 8 characters followed by
/// "..", or the id itself when it is no longer than that.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}
