//! Electronic data capture for height, weight, BMI and cardiac events.
//!
//! The form's inputs arrive as a [`CaptureRequest`]; nothing here reads
//! shared widget state. Labels missing from a request come from the risk
//! model, and random patients draw their height and weight from an
//! [`IntegerRangeSource`].

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::CoreError;
use crate::models::{CardiacEvent, PatientMeasurement};
use crate::randomness::{IntegerRangeSource, RandomnessSource};
use crate::risk;
use crate::store::RecordStore;

/// Values entered on the capture form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Metres.
    pub height: f64,
    /// Kilograms.
    pub weight: f64,
    /// `None` lets the risk model decide.
    pub cardiac_event: Option<CardiacEvent>,
}

/// A stored measurement with its position in the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub index: usize,
    pub height: f64,
    pub weight: f64,
    pub bmi: f64,
    pub cardiac_event: CardiacEvent,
}

impl MeasurementRow {
    fn new(index: usize, m: &PatientMeasurement) -> Self {
        Self {
            index,
            height: m.height(),
            weight: m.weight(),
            bmi: m.bmi(),
            cardiac_event: m.cardiac_event(),
        }
    }
}

/// Builds a measurement from a form request.
pub fn capture<R: RandomnessSource + ?Sized>(
    request: &CaptureRequest,
    rng: &mut R,
) -> Result<PatientMeasurement, CoreError> {
    let bmi = crate::models::calculate_bmi(request.height, request.weight)?;
    let cardiac_event = match request.cardiac_event {
        Some(label) => label,
        None => risk::classify(bmi, rng)?,
    };
    tracing::info!(
        height = request.height,
        weight = request.weight,
        bmi = %format!("{bmi:.2}"),
        cardiac_event = cardiac_event.as_str(),
        "Captured measurement"
    );
    PatientMeasurement::new(request.height, request.weight, cardiac_event)
}

/// Draws a random patient: height in centimetres converted to metres,
/// weight in kilograms, label from the risk model.
pub fn random_patient<S, R>(source: &mut S, rng: &mut R) -> Result<PatientMeasurement, CoreError>
where
    S: IntegerRangeSource + ?Sized,
    R: RandomnessSource + ?Sized,
{
    let (h_min, h_max) = config::RANDOM_HEIGHT_CM;
    let (w_min, w_max) = config::RANDOM_WEIGHT_KG;

    let height_cm = source.draw_int(h_min, h_max)?;
    let weight_kg = source.draw_int(w_min, w_max)?;
    if height_cm <= 0 || weight_kg <= 0 {
        return Err(CoreError::Source(format!(
            "non-positive random draw (height={height_cm} cm, weight={weight_kg} kg)"
        )));
    }

    let height = height_cm as f64 / 100.0;
    let weight = weight_kg as f64;
    tracing::info!(height, weight, "Generated random patient");

    capture(
        &CaptureRequest {
            height,
            weight,
            cardiac_event: None,
        },
        rng,
    )
}

/// The measurement log behind the capture form.
pub struct CaptureService {
    store: RecordStore<PatientMeasurement>,
}

impl CaptureService {
    pub fn new(store: RecordStore<PatientMeasurement>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore<PatientMeasurement> {
        &self.store
    }

    pub fn save(&self, measurement: &PatientMeasurement) -> Result<(), CoreError> {
        self.store.append(measurement)
    }

    /// Captures a request and appends it in one step.
    pub fn submit<R: RandomnessSource + ?Sized>(
        &self,
        request: &CaptureRequest,
        rng: &mut R,
    ) -> Result<PatientMeasurement, CoreError> {
        let measurement = capture(request, rng)?;
        self.save(&measurement)?;
        Ok(measurement)
    }

    pub fn records(&self) -> Result<Vec<MeasurementRow>, CoreError> {
        Ok(self
            .store
            .read_records()?
            .iter()
            .enumerate()
            .map(|(i, m)| MeasurementRow::new(i, m))
            .collect())
    }

    pub fn measurements(&self) -> Result<Vec<PatientMeasurement>, CoreError> {
        self.store.read_records()
    }

    pub fn delete(&self, index: usize) -> Result<(), CoreError> {
        self.store.delete_at(index)
    }
}
