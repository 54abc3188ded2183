//! Row filters and sort orders for [`RecordStore`](crate::RecordStore) queries.
//!
//! Conditions address a record by its serialized top-level field names and
//! compare against JSON values. Numbers compare numerically and strings
//! lexicographically. A missing field reads as `null`.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// A single predicate over one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
	Eq(String, Value),
	Neq(String, Value),
	In(String, Vec<Value>),
	Gt(String, Value),
	Gte(String, Value),
	Lt(String, Value),
	Lte(String, Value),
}

impl Condition {
	fn matches(&self, row: &Value) -> bool {
		match self {
			Condition::Eq(field, expected) => field_of(row, field) == expected,
			Condition::Neq(field, expected) => field_of(row, field) != expected,
			Condition::In(field, options) => options.contains(field_of(row, field)),
			Condition::Gt(field, bound) => {
				compare(field_of(row, field), bound) == Some(Ordering::Greater)
			},
			Condition::Gte(field, bound) => matches!(
				compare(field_of(row, field), bound),
				Some(Ordering::Greater | Ordering::Equal)
			),
			Condition::Lt(field, bound) => {
				compare(field_of(row, field), bound) == Some(Ordering::Less)
			},
			Condition::Lte(field, bound) => matches!(
				compare(field_of(row, field), bound),
				Some(Ordering::Less | Ordering::Equal)
			),
		}
	}
}

/// Conjunction of conditions. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
	conditions: Vec<Condition>,
}

impl Filter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn eq(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Eq(field.to_string(), to_json(value)))
	}

	pub fn neq(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Neq(field.to_string(), to_json(value)))
	}

	pub fn in_<V: Serialize>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
		let values = values.into_iter().map(to_json).collect();
		self.with(Condition::In(field.to_string(), values))
	}

	pub fn gt(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Gt(field.to_string(), to_json(value)))
	}

	pub fn gte(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Gte(field.to_string(), to_json(value)))
	}

	pub fn lt(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Lt(field.to_string(), to_json(value)))
	}

	pub fn lte(self, field: &str, value: impl Serialize) -> Self {
		self.with(Condition::Lte(field.to_string(), to_json(value)))
	}

	pub fn with(mut self, condition: Condition) -> Self {
		self.conditions.push(condition);
		self
	}

	/// Whether the serialized row satisfies every condition.
	pub fn matches(&self, row: &Value) -> bool {
		self.conditions.iter().all(|c| c.matches(row))
	}
}

/// Ordering of a select by one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
	pub field: String,
	pub descending: bool,
}

impl Sort {
	pub fn asc(field: &str) -> Self {
		Self {
			field: field.to_string(),
			descending: false,
		}
	}

	pub fn desc(field: &str) -> Self {
		Self {
			field: field.to_string(),
			descending: true,
		}
	}

	/// Compares two serialized rows. Incomparable values are treated as equal.
	pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
		let ordering =
			compare(field_of(a, &self.field), field_of(b, &self.field)).unwrap_or(Ordering::Equal);
		if self.descending {
			ordering.reverse()
		} else {
			ordering
		}
	}
}

// Values that cannot be serialized compare as null.
fn to_json(value: impl Serialize) -> Value {
	serde_json::to_value(value).unwrap_or(Value::Null)
}

fn field_of<'a>(row: &'a Value, field: &str) -> &'a Value {
	row.get(field).unwrap_or(&Value::Null)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => match (x.as_u64(), y.as_u64()) {
			(Some(x), Some(y)) => Some(x.cmp(&y)),
			_ => x.as_f64()?.partial_cmp(&y.as_f64()?),
		},
		(Value::String(x), Value::String(y)) => Some(x.cmp(y)),
		(Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
		(Value::Null, Value::Null) => Some(Ordering::Equal),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn row(status: &str, venue: &str, created_at: u64) -> Value {
		json!({ "status": status, "venue": venue, "created_at": created_at })
	}

	#[test]
	fn test_equality_and_membership() {
		let filter = Filter::new()
			.eq("venue", "bitbites")
			.in_("status", ["pending", "ready"]);
		assert!(filter.matches(&row("ready", "bitbites", 1)));
		assert!(!filter.matches(&row("cart", "bitbites", 1)));
		assert!(!filter.matches(&row("ready", "medical", 1)));
		assert!(Filter::new().matches(&row("cart", "medical", 1)));
	}

	#[test]
	fn test_neq_matches_missing_field() {
		let filter = Filter::new().neq("owner", "u1");
		assert!(filter.matches(&row("cart", "medical", 1)));
		assert!(!filter.matches(&json!({ "owner": "u1" })));
	}

	#[test]
	fn test_ranges_compare_numbers() {
		let filter = Filter::new().gte("created_at", 10u64).lt("created_at", 20u64);
		assert!(filter.matches(&row("pending", "medical", 10)));
		assert!(filter.matches(&row("pending", "medical", 19)));
		assert!(!filter.matches(&row("pending", "medical", 20)));
		assert!(!filter.matches(&row("pending", "medical", 9)));
		assert!(Filter::new().gt("created_at", 5).lte("created_at", 10).matches(&row("x", "y", 10)));
		// mismatched types never satisfy a range
		assert!(!Filter::new().gt("status", 1).matches(&row("pending", "medical", 1)));
	}

	#[test]
	fn test_sort_descending() {
		let mut rows = vec![
			row("pending", "medical", 2),
			row("pending", "medical", 3),
			row("pending", "medical", 1),
		];
		let sort = Sort::desc("created_at");
		rows.sort_by(|a, b| sort.compare(a, b));
		let order: Vec<_> = rows.iter().map(|r| r["created_at"].as_u64().unwrap()).collect();
		assert_eq!(order, vec![3, 2, 1]);
	}
}
