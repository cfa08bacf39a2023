use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::enums::VisitReason;
use crate::error::CoreError;
use crate::store::StoreRecord;

/// Date format of the visit log's date column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the visit log. Identity is positional; duplicates are
/// indistinguishable from their originals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitRecord {
    pub patient_name: String,
    pub reason: VisitReason,
    pub date: NaiveDate,
    pub duration: u32,
}

impl VisitRecord {
    /// Visit date truncated to its calendar month.
    pub fn month(&self) -> YearMonth {
        YearMonth::from(self.date)
    }
}

/// A (year, month) bucket derived from a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl StoreRecord for VisitRecord {
    const COLUMNS: usize = 4;

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.patient_name.clone(),
            self.reason.as_str().to_string(),
            self.date.format(DATE_FORMAT).to_string(),
            self.duration.to_string(),
        ]
    }

    fn from_fields(fields: &[String], row: usize) -> Result<Self, CoreError> {
        let [name, reason, date, duration] = fields else {
            return Err(CoreError::format(
                row,
                format!("expected {} columns, found {}", Self::COLUMNS, fields.len()),
            ));
        };

        let reason = reason
            .parse::<VisitReason>()
            .map_err(|e| CoreError::format(row, e.to_string()))?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|e| CoreError::format(row, format!("bad date {date:?}: {e}")))?;
        let duration = duration
            .parse::<u32>()
            .map_err(|e| CoreError::format(row, format!("bad duration {duration:?}: {e}")))?;

        Ok(VisitRecord {
            patient_name: name.clone(),
            reason,
            date,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> VisitRecord {
        VisitRecord {
            patient_name: "Alice Smith".into(),
            reason: VisitReason::RoutineCheckup,
            date: NaiveDate::from_ymd_opt(2022, 3, 7).unwrap(),
            duration: 20,
        }
    }

    #[test]
    fn serializes_in_column_order() {
        assert_eq!(
            sample().to_fields(),
            fields(&["Alice Smith", "Routine Checkup", "2022-03-07", "20"])
        );
    }

    #[test]
    fn parses_stored_row() {
        let row = fields(&["Alice Smith", "Routine Checkup", "2022-03-07", "20"]);
        assert_eq!(VisitRecord::from_fields(&row, 0).unwrap(), sample());
    }

    #[test]
    fn unknown_reason_is_format_error() {
        let row = fields(&["Bob Jones", "Sneezing", "2022-03-07", "20"]);
        let err = VisitRecord::from_fields(&row, 4).unwrap_err();
        assert!(matches!(err, CoreError::Format { row: 4, .. }));
    }

    #[test]
    fn bad_date_is_format_error() {
        let row = fields(&["Bob Jones", "Fever", "2022-13-40", "20"]);
        assert!(matches!(
            VisitRecord::from_fields(&row, 0),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn wrong_column_count_is_format_error() {
        let row = fields(&["Bob Jones", "Fever", "2022-01-01"]);
        assert!(matches!(
            VisitRecord::from_fields(&row, 2),
            Err(CoreError::Format { row: 2, .. })
        ));
    }

    #[test]
    fn month_truncates_day() {
        let m = sample().month();
        assert_eq!(m, YearMonth { year: 2022, month: 3 });
        assert_eq!(m.to_string(), "2022-03");
    }
}
