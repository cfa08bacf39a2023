//! Seasonally skewed synthetic visit-log generator.
//!
//! Each record draws a patient name, a reason, a month weighted by the
//! reason's seasonal profile, a day in 1..=28 and a duration from the
//! reason's range. Duplicates are injected afterwards by resampling the
//! materialised records, so the seasonal draws stay independently
//! testable.
//!
//! The reason-choice set, the seasonal table and the duration table are
//! independent lists. A reason missing from either table is a
//! configuration error at the moment it is drawn, not at construction.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{VisitReason, VisitRecord};
use crate::randomness::RandomnessSource;
use crate::store::RecordStore;

/// Relative visit frequency per calendar month (January first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    pub reason: VisitReason,
    pub weights: [f64; 12],
}

/// Inclusive visit duration bounds for a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub reason: VisitReason,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Calendar year of every generated visit.
    pub year: i32,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    /// Reasons drawn uniformly for each record.
    pub reasons: Vec<VisitReason>,
    pub seasonal: Vec<SeasonalProfile>,
    pub durations: Vec<DurationRange>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn profile(reason: VisitReason, weights: [f64; 12]) -> SeasonalProfile {
    SeasonalProfile { reason, weights }
}

fn range(reason: VisitReason, min: u32, max: u32) -> DurationRange {
    DurationRange { reason, min, max }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        use VisitReason::*;

        let seasonal = vec![
            profile(Fever, [100.0, 10.0, 10.0, 60.0, 20.0, 10.0, 10.0, 10.0, 10.0, 80.0, 20.0, 40.0]),
            profile(Cough, [100.0, 80.0, 10.0, 10.0, 40.0, 10.0, 40.0, 10.0, 10.0, 80.0, 20.0, 40.0]),
            profile(Headache, [90.0, 60.0, 10.0, 55.0, 10.0, 30.0, 40.0, 100.0, 10.0, 10.0, 10.0, 80.0]),
            profile(Allergy, [70.0, 10.0, 100.0, 100.0, 10.0, 10.0, 10.0, 80.0, 10.0, 10.0, 80.0, 10.0]),
            profile(Injury, [50.0, 10.0, 50.0, 10.0, 60.0, 10.0, 100.0, 10.0, 50.0, 100.0, 50.0, 40.0]),
            profile(RoutineCheckup, [1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.5, 1.4, 1.3, 1.2, 1.1]),
        ];

        Self {
            year: 2022,
            first_names: names(&[
                "Alice", "Bob", "Charlie", "David", "Emma", "Fiona", "George", "Hannah", "Ivy",
                "Jack",
            ]),
            last_names: names(&[
                "Smith", "Johnson", "Williams", "Jones", "Brown", "Davis", "Miller", "Wilson",
                "Moore", "Taylor",
            ]),
            reasons: seasonal.iter().map(|p| p.reason).collect(),
            seasonal,
            durations: vec![
                range(Fever, 15, 45),
                range(Cough, 10, 30),
                range(Headache, 5, 25),
                range(Stomachache, 20, 40),
                range(Allergy, 10, 30),
                range(Injury, 30, 60),
                range(Fatigue, 15, 35),
                range(RoutineCheckup, 15, 30),
            ],
        }
    }
}

impl GeneratorConfig {
    /// Loads a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            CoreError::Configuration(format!("invalid generator config {}: {e}", path.display()))
        })
    }
}

pub struct RecordGenerator {
    config: GeneratorConfig,
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl RecordGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// `count` fresh records followed by `duplicate_count` resampled copies.
    pub fn generate<R: RandomnessSource + ?Sized>(
        &self,
        count: usize,
        duplicate_count: usize,
        rng: &mut R,
    ) -> Result<Vec<VisitRecord>, CoreError> {
        let mut records = Vec::with_capacity(count + duplicate_count);
        for _ in 0..count {
            records.push(self.generate_visit(rng)?);
        }
        inject_duplicates(&mut records, duplicate_count, rng)?;

        tracing::info!(count, duplicate_count, year = self.config.year, "Generated visit records");
        Ok(records)
    }

    pub fn generate_visit<R: RandomnessSource + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<VisitRecord, CoreError> {
        let patient_name = self.patient_name(rng)?;
        let reason = self.visit_reason(rng)?;
        let date = self.visit_date(reason, rng)?;
        let duration = self.visit_duration(reason, rng)?;
        Ok(VisitRecord {
            patient_name,
            reason,
            date,
            duration,
        })
    }

    /// Independent first and last name draws, space separated.
    pub fn patient_name<R: RandomnessSource + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<String, CoreError> {
        let first = pick(&self.config.first_names, "first name", rng)?;
        let last = pick(&self.config.last_names, "last name", rng)?;
        Ok(format!("{first} {last}"))
    }

    pub fn visit_reason<R: RandomnessSource + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<VisitReason, CoreError> {
        pick(&self.config.reasons, "visit reason", rng).copied()
    }

    /// Month weighted by the reason's seasonal profile; day uniform in
    /// 1..=28 so every month yields a valid date.
    pub fn visit_date<R: RandomnessSource + ?Sized>(
        &self,
        reason: VisitReason,
        rng: &mut R,
    ) -> Result<NaiveDate, CoreError> {
        let weights = self.seasonal_weights(reason)?;
        let month = rng.weighted_choice(weights)? as u32 + 1;
        let day = rng.range_inclusive(1, 28)? as u32;
        NaiveDate::from_ymd_opt(self.config.year, month, day).ok_or_else(|| {
            CoreError::Domain(format!("invalid date {}-{month}-{day}", self.config.year))
        })
    }

    pub fn visit_duration<R: RandomnessSource + ?Sized>(
        &self,
        reason: VisitReason,
        rng: &mut R,
    ) -> Result<u32, CoreError> {
        let DurationRange { min, max, .. } = self.duration_range(reason)?;
        Ok(rng.range_inclusive(min as i64, max as i64)? as u32)
    }

    pub fn seasonal_weights(&self, reason: VisitReason) -> Result<&[f64; 12], CoreError> {
        self.config
            .seasonal
            .iter()
            .find(|p| p.reason == reason)
            .map(|p| &p.weights)
            .ok_or_else(|| {
                CoreError::Configuration(format!("no seasonal profile for reason {reason:?}"))
            })
    }

    pub fn duration_range(&self, reason: VisitReason) -> Result<DurationRange, CoreError> {
        let entry = self
            .config
            .durations
            .iter()
            .find(|d| d.reason == reason)
            .copied()
            .ok_or_else(|| {
                CoreError::Configuration(format!("no duration range for reason {reason:?}"))
            })?;
        if entry.min > entry.max {
            return Err(CoreError::Configuration(format!(
                "duration range for {reason:?} is empty ({}..={})",
                entry.min, entry.max
            )));
        }
        Ok(entry)
    }
}

/// Appends `n` copies of records picked uniformly, with replacement,
/// from the records present before the first injection.
pub fn inject_duplicates<R: RandomnessSource + ?Sized>(
    records: &mut Vec<VisitRecord>,
    n: usize,
    rng: &mut R,
) -> Result<(), CoreError> {
    if n == 0 {
        return Ok(());
    }
    let originals = records.len();
    if originals == 0 {
        return Err(CoreError::Domain("no records to duplicate".into()));
    }
    records.reserve(n);
    for _ in 0..n {
        let i = rng.choose_index(originals)?;
        let copy = records[i].clone();
        records.push(copy);
    }
    tracing::debug!(originals, injected = n, "Injected duplicate records");
    Ok(())
}

/// Replaces the visit log's contents with `records`.
pub fn write_dataset(
    store: &RecordStore<VisitRecord>,
    records: &[VisitRecord],
) -> Result<(), CoreError> {
    store.replace_all(records)?;
    tracing::info!(path = %store.path().display(), rows = records.len(), "Dataset saved");
    Ok(())
}

fn pick<'a, T, R: RandomnessSource + ?Sized>(
    items: &'a [T],
    what: &str,
    rng: &mut R,
) -> Result<&'a T, CoreError> {
    if items.is_empty() {
        return Err(CoreError::Configuration(format!("no {what} to choose from")));
    }
    Ok(&items[rng.choose_index(items.len())?])
}
