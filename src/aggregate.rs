//! Grouping and summary metrics for display collaborators.
//!
//! Groups come out in order of first appearance in the input, never
//! sorted. Every group is built from at least one record, so a mean is
//! never taken over an empty group.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{PatientMeasurement, VisitRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricOp {
    Count,
    Mean,
}

/// One output row: the group's key values and its metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: Vec<String>,
    pub value: f64,
}

/// Field access by name for grouping and metrics.
pub trait Summarizable {
    /// Categorical value of a group-by field, or `None` if unknown.
    fn key_field(&self, field: &str) -> Option<String>;

    /// Numeric value of a metric field, or `None` if unknown.
    fn metric_field(&self, field: &str) -> Option<f64>;
}

impl Summarizable for VisitRecord {
    fn key_field(&self, field: &str) -> Option<String> {
        match field {
            "patient_name" => Some(self.patient_name.clone()),
            "reason" => Some(self.reason.as_str().to_string()),
            "date" => Some(self.date.format(crate::models::DATE_FORMAT).to_string()),
            "month" => Some(self.month().to_string()),
            "duration" => Some(self.duration.to_string()),
            _ => None,
        }
    }

    fn metric_field(&self, field: &str) -> Option<f64> {
        match field {
            "duration" => Some(self.duration as f64),
            _ => None,
        }
    }
}

impl Summarizable for PatientMeasurement {
    fn key_field(&self, field: &str) -> Option<String> {
        match field {
            "cardiac_event" => Some(self.cardiac_event().as_str().to_string()),
            _ => None,
        }
    }

    fn metric_field(&self, field: &str) -> Option<f64> {
        match field {
            "height" => Some(self.height()),
            "weight" => Some(self.weight()),
            "bmi" => Some(self.bmi()),
            _ => None,
        }
    }
}

fn key_of<T: Summarizable>(record: &T, group_keys: &[&str]) -> Result<Vec<String>, CoreError> {
    group_keys
        .iter()
        .map(|field| {
            record
                .key_field(field)
                .ok_or_else(|| CoreError::Configuration(format!("unknown group field {field:?}")))
        })
        .collect()
}

fn metric_of<T: Summarizable>(record: &T, field: &str) -> Result<f64, CoreError> {
    record
        .metric_field(field)
        .ok_or_else(|| CoreError::Configuration(format!("unknown metric field {field:?}")))
}

/// Partitions records by key, keeping each group's metric values.
fn partition<T: Summarizable>(
    records: &[T],
    group_keys: &[&str],
    metric_field: Option<&str>,
) -> Result<Vec<(Vec<String>, Vec<f64>)>, CoreError> {
    let mut groups: Vec<(Vec<String>, Vec<f64>)> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for record in records {
        let key = key_of(record, group_keys)?;
        let value = match metric_field {
            Some(field) => metric_of(record, field)?,
            None => 1.0,
        };
        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push(value);
    }
    Ok(groups)
}

/// Arithmetic mean. Fails on an empty slice.
pub fn mean(values: &[f64]) -> Result<f64, CoreError> {
    if values.is_empty() {
        return Err(CoreError::Domain("mean of an empty group".into()));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Groups `records` by `group_keys` and computes one metric per group.
/// `metric_field` is only consulted for [`MetricOp::Mean`].
pub fn summarize<T: Summarizable>(
    records: &[T],
    group_keys: &[&str],
    metric_field: &str,
    op: MetricOp,
) -> Result<Vec<SummaryRow>, CoreError> {
    let metric = match op {
        MetricOp::Count => None,
        MetricOp::Mean => Some(metric_field),
    };

    let rows = partition(records, group_keys, metric)?
        .into_iter()
        .map(|(key, values)| -> Result<SummaryRow, CoreError> {
            let value = match op {
                MetricOp::Count => values.len() as f64,
                MetricOp::Mean => mean(&values)?,
            };
            Ok(SummaryRow { key, value })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    tracing::debug!(groups = rows.len(), ?group_keys, ?op, "Summarized records");
    Ok(rows)
}

/// Per-group value lists, for box plots and scatter plots.
pub fn series_by_group<T: Summarizable>(
    records: &[T],
    group_key: &str,
    metric_field: &str,
) -> Result<Vec<(String, Vec<f64>)>, CoreError> {
    Ok(partition(records, &[group_key], Some(metric_field))?
        .into_iter()
        .map(|(mut key, values)| (key.remove(0), values))
        .collect())
}

/// Drops value-identical repeats, keeping first occurrences in order.
pub fn remove_duplicates<T: Eq + Hash + Clone>(records: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    let kept: Vec<T> = records
        .iter()
        .filter(|r| seen.insert(*r))
        .cloned()
        .collect();
    tracing::info!(before = records.len(), after = kept.len(), "Removed duplicates");
    kept
}

/// Visit counts per (reason, month).
pub fn visits_per_reason_month(records: &[VisitRecord]) -> Result<Vec<SummaryRow>, CoreError> {
    summarize(records, &["reason", "month"], "patient_name", MetricOp::Count)
}

/// Mean visit duration per reason.
pub fn mean_duration_per_reason(records: &[VisitRecord]) -> Result<Vec<SummaryRow>, CoreError> {
    summarize(records, &["reason"], "duration", MetricOp::Mean)
}

/// Mean BMI per cardiac-event label.
pub fn bmi_by_cardiac_event(
    measurements: &[PatientMeasurement],
) -> Result<Vec<SummaryRow>, CoreError> {
    summarize(measurements, &["cardiac_event"], "bmi", MetricOp::Mean)
}
