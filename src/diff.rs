//! Before/after comparison of parameter values.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use crate::params::{format_value, ParameterMap};

/// Parameter key to normalized value, in plugin order.
pub type ParamSnapshot = IndexMap<String, f64>;

pub fn snapshot(parameters: &ParameterMap) -> ParamSnapshot {
    parameters
        .iter()
        .map(|(key, p)| (key.to_string(), p.raw_value))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueChange {
    pub before: f64,
    pub after: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDiff {
    /// Keys present on both sides whose values differ, in `before` order.
    pub changed: IndexMap<String, ValueChange>,
    pub missing_in_new: BTreeSet<String>,
    pub missing_in_initial: BTreeSet<String>,
    pub before_count: usize,
    pub after_count: usize,
}

impl ParamDiff {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty() && self.missing_in_new.is_empty() && self.missing_in_initial.is_empty()
    }
}

pub fn diff(before: &ParamSnapshot, after: &ParamSnapshot) -> ParamDiff {
    let changed = before
        .iter()
        .filter_map(|(key, &b)| match after.get(key) {
            Some(&a) if a != b => Some((key.clone(), ValueChange { before: b, after: a })),
            _ => None,
        })
        .collect();

    let missing_in_new = before
        .keys()
        .filter(|k| !after.contains_key(*k))
        .cloned()
        .collect();
    let missing_in_initial = after
        .keys()
        .filter(|k| !before.contains_key(*k))
        .cloned()
        .collect();

    ParamDiff {
        changed,
        missing_in_new,
        missing_in_initial,
        before_count: before.len(),
        after_count: after.len(),
    }
}

/// The diff report, one line per entry. Parameter names are looked up in
/// `names`; keys unknown there are printed with `?`.
pub fn diff_report_lines(diff: &ParamDiff, names: &ParameterMap) -> Vec<String> {
    let mut lines = Vec::new();
    if !diff.missing_in_new.is_empty() {
        lines.push(format!(
            "Warning: These keys were in the initial parameters, but are missing in the new parameters: {:?}",
            diff.missing_in_new
        ));
    }
    if !diff.missing_in_initial.is_empty() {
        lines.push(format!(
            "Warning: These keys were not in the initial parameters, but are in the new parameters: {:?}",
            diff.missing_in_initial
        ));
    }

    lines.push(format!("Number of parameters before: {}", diff.before_count));
    lines.push(format!("Number of parameters after: {}", diff.after_count));
    lines.push(format!("Number of parameters changed: {}", diff.changed.len()));

    for (key, change) in &diff.changed {
        let name = names.get(key).map(|p| p.name.as_str()).unwrap_or("?");
        lines.push(format!(
            "Parameter: {key} ({name}), Before: {}, After: {}",
            format_value(change.before),
            format_value(change.after)
        ));
    }
    lines
}

pub fn report_diff(diff: &ParamDiff, names: &ParameterMap) {
    for line in diff_report_lines(diff, names) {
        println!("{line}");
    }
}

/// Key-set comparison between two plugins' parameter maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyComparison {
    pub only_in_a: BTreeSet<String>,
    pub only_in_b: BTreeSet<String>,
    pub in_both: BTreeSet<String>,
}

pub fn compare_keys<'a>(
    a: impl IntoIterator<Item = &'a str>,
    b: impl IntoIterator<Item = &'a str>,
) -> KeyComparison {
    let a: BTreeSet<String> = a.into_iter().map(str::to_string).collect();
    let b: BTreeSet<String> = b.into_iter().map(str::to_string).collect();

    KeyComparison {
        only_in_a: a.difference(&b).cloned().collect(),
        only_in_b: b.difference(&a).cloned().collect(),
        in_both: a.intersection(&b).cloned().collect(),
    }
}
