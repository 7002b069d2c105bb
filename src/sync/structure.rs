//! Pure projections over the nested budget document.
//!
//! The document is a mapping `phase -> department -> saved data`, where the
//! saved data carries heterogeneous row records. Input is untrusted and
//! frequently partial: anything absent, null, or malformed yields an empty
//! result at that level, never an error.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

/// Row-kind discriminator carried by budget rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Labor,
    Cost,
    Person,
}

impl RowKind {
    fn parse(row: &Value) -> Option<Self> {
        match row.get("kind").and_then(Value::as_str) {
            Some("labor") => Some(RowKind::Labor),
            Some("cost") => Some(RowKind::Cost),
            Some("person") => Some(RowKind::Person),
            _ => None,
        }
    }

    /// Default for rows lacking the discriminator: the cast department
    /// holds people, every other department holds labor lines.
    fn default_for(department: &str) -> Self {
        if crate::share::department_slug(department) == "cast" {
            RowKind::Person
        } else {
            RowKind::Labor
        }
    }
}

/// A department's saved data, as a named record.
///
/// The historical wire form is a positional array with fixed index meaning:
/// `[rows, expenses, locked, settings]`. That form is still accepted on
/// read. Appending a fifth element to it is a breaking change to the
/// implicit protocol and must be reviewed here first.
#[derive(Debug, Default, Clone)]
pub struct DepartmentData {
    pub rows: Vec<Value>,
    pub expenses: Vec<Value>,
    pub locked: bool,
    pub settings: Value,
}

impl DepartmentData {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(parts) => {
                // Legacy positional layout. A bare array of row objects
                // (no inner array at index 0) is treated as rows only.
                if parts.first().map(Value::is_array) == Some(true) {
                    Self {
                        rows: as_vec(parts.first()),
                        expenses: as_vec(parts.get(1)),
                        locked: parts.get(2).and_then(Value::as_bool).unwrap_or(false),
                        settings: parts.get(3).cloned().unwrap_or(Value::Null),
                    }
                } else {
                    Self {
                        rows: parts.clone(),
                        ..Self::default()
                    }
                }
            }
            Value::Object(obj) => Self {
                rows: as_vec(obj.get("rows")),
                expenses: as_vec(obj.get("expenses")),
                locked: obj.get("locked").and_then(Value::as_bool).unwrap_or(false),
                settings: obj.get("settings").cloned().unwrap_or(Value::Null),
            },
            _ => Self::default(),
        }
    }
}

fn as_vec(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn row_name(row: &Value) -> Option<&str> {
    row.get("name")
        .or_else(|| row.get("label"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Visit `(department, data)` across every phase of the document.
fn departments(doc: &Value) -> impl Iterator<Item = (&str, DepartmentData)> {
    doc.as_object()
        .into_iter()
        .flat_map(|phases| phases.values())
        .flat_map(|phase| phase.as_object())
        .flat_map(|depts| depts.iter())
        .map(|(name, data)| (name.as_str(), DepartmentData::from_value(data)))
}

fn collect_names(doc: &Value, wanted: RowKind) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for (department, data) in departments(doc) {
        for row in &data.rows {
            let kind = RowKind::parse(row).unwrap_or_else(|| RowKind::default_for(department));
            if kind != wanted {
                continue;
            }
            if let Some(name) = row_name(row)
                && seen.insert(name.to_string())
            {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// All team member names across phases and departments, de-duplicated,
/// first-seen order.
pub fn team_member_names(doc: &Value) -> Vec<String> {
    collect_names(doc, RowKind::Labor)
}

/// All cast member names, de-duplicated, first-seen order.
pub fn cast_member_names(doc: &Value) -> Vec<String> {
    collect_names(doc, RowKind::Person)
}

/// Department -> de-duplicated cost item names. Cost items come from rows
/// carrying the `cost` kind and from the department's expense entries.
/// Departments without any item are omitted.
pub fn cost_items_by_department(doc: &Value) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    let mut push = |department: &str, item: &str| {
        if seen.insert((department.to_string(), item.to_string())) {
            out.entry(department.to_string())
                .or_default()
                .push(item.to_string());
        }
    };

    for (department, data) in departments(doc) {
        for row in &data.rows {
            if RowKind::parse(row) == Some(RowKind::Cost)
                && let Some(name) = row_name(row)
            {
                push(department, name);
            }
        }
        for expense in &data.expenses {
            if let Some(name) = row_name(expense) {
                push(department, name);
            }
        }
    }
    out
}
