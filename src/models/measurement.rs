use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::enums::CardiacEvent;
use crate::error::CoreError;
use crate::store::StoreRecord;

/// Body mass index from height in metres and weight in kilograms.
pub fn calculate_bmi(height: f64, weight: f64) -> Result<f64, CoreError> {
    if !height.is_finite() || !weight.is_finite() || height <= 0.0 || weight <= 0.0 {
        return Err(CoreError::Domain(format!(
            "height and weight must be positive values (height={height}, weight={weight})"
        )));
    }
    Ok(weight / (height * height))
}

/// One row of the measurement log.
///
/// BMI is never held in memory; it is derived from height and weight on
/// every access. The persisted row carries it redundantly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientMeasurement {
    height: f64,
    weight: f64,
    cardiac_event: CardiacEvent,
}

impl PatientMeasurement {
    pub fn new(height: f64, weight: f64, cardiac_event: CardiacEvent) -> Result<Self, CoreError> {
        calculate_bmi(height, weight)?;
        Ok(Self {
            height,
            weight,
            cardiac_event,
        })
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn bmi(&self) -> f64 {
        self.weight / (self.height * self.height)
    }

    pub fn cardiac_event(&self) -> CardiacEvent {
        self.cardiac_event
    }
}

/// Serializes with the derived BMI, in stored column order.
impl Serialize for PatientMeasurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PatientMeasurement", 4)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("weight", &self.weight)?;
        state.serialize_field("bmi", &self.bmi())?;
        state.serialize_field("cardiac_event", &self.cardiac_event)?;
        state.end()
    }
}

fn parse_real(value: &str, column: &str, row: usize) -> Result<f64, CoreError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| CoreError::format(row, format!("bad {column} {value:?}: {e}")))
}

impl StoreRecord for PatientMeasurement {
    const COLUMNS: usize = 4;

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.height.to_string(),
            self.weight.to_string(),
            self.bmi().to_string(),
            self.cardiac_event.as_str().to_string(),
        ]
    }

    fn from_fields(fields: &[String], row: usize) -> Result<Self, CoreError> {
        let [height, weight, bmi, event] = fields else {
            return Err(CoreError::format(
                row,
                format!("expected {} columns, found {}", Self::COLUMNS, fields.len()),
            ));
        };

        let height = parse_real(height, "height", row)?;
        let weight = parse_real(weight, "weight", row)?;
        // The stored BMI must be numeric but is not reconciled.
        parse_real(bmi, "bmi", row)?;
        let cardiac_event = event
            .parse::<CardiacEvent>()
            .map_err(|e| CoreError::format(row, e.to_string()))?;

        PatientMeasurement::new(height, weight, cardiac_event)
            .map_err(|e| CoreError::format(row, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bmi_is_weight_over_height_squared() {
        let bmi = calculate_bmi(2.0, 80.0).unwrap();
        assert!((bmi - 20.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_inputs_are_domain_errors() {
        assert!(matches!(calculate_bmi(0.0, 70.0), Err(CoreError::Domain(_))));
        assert!(matches!(calculate_bmi(1.7, -1.0), Err(CoreError::Domain(_))));
        assert!(matches!(calculate_bmi(f64::NAN, 70.0), Err(CoreError::Domain(_))));
    }

    #[test]
    fn measurement_derives_bmi() {
        let m = PatientMeasurement::new(1.6, 64.0, CardiacEvent::No).unwrap();
        assert!((m.bmi() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn stored_bmi_matches_recomputation_at_write_time() {
        let m = PatientMeasurement::new(1.83, 97.0, CardiacEvent::Yes).unwrap();
        let row = m.to_fields();
        let stored: f64 = row[2].parse().unwrap();
        assert_eq!(stored, calculate_bmi(1.83, 97.0).unwrap());
        assert_eq!(row[3], "Yes");
    }

    #[test]
    fn json_includes_derived_bmi() {
        let m = PatientMeasurement::new(1.6, 64.0, CardiacEvent::Yes).unwrap();
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["height"], 1.6);
        assert_eq!(json["weight"], 64.0);
        assert!((json["bmi"].as_f64().unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(json["cardiac_event"], "Yes");
    }

    #[test]
    fn parses_stored_row() {
        let row = fields(&["1.75", "70", "22.857142857142858", "No"]);
        let m = PatientMeasurement::from_fields(&row, 0).unwrap();
        assert_eq!(m.height(), 1.75);
        assert_eq!(m.weight(), 70.0);
        assert_eq!(m.cardiac_event(), CardiacEvent::No);
    }

    #[test]
    fn non_numeric_bmi_is_format_error() {
        let row = fields(&["1.75", "70", "high", "No"]);
        assert!(matches!(
            PatientMeasurement::from_fields(&row, 3),
            Err(CoreError::Format { row: 3, .. })
        ));
    }

    #[test]
    fn zero_height_in_file_is_format_error() {
        let row = fields(&["0", "70", "0", "No"]);
        assert!(matches!(
            PatientMeasurement::from_fields(&row, 1),
            Err(CoreError::Format { row: 1, .. })
        ));
    }
}
