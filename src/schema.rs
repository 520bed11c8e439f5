//! Canonical practitioner record, query batch and the validators that guard them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::NPI_LEN;
use crate::error::{FieldError, FieldProblem, IngestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FirstName,
    LastName,
    Npi,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::FirstName, Field::LastName, Field::Npi];

    pub fn key(self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Npi => "npi",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_name" | "first" | "firstname" => Ok(Field::FirstName),
            "last_name" | "last" | "lastname" => Ok(Field::LastName),
            "npi" => Ok(Field::Npi),
            other => Err(format!(
                "unknown field {other:?} (expected first_name, last_name or npi)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerRecord {
    pub first_name: String,
    pub last_name: String,
    pub npi: String,
}

impl PractitionerRecord {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        npi: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            npi: npi.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FirstName => &self.first_name,
            Field::LastName => &self.last_name,
            Field::Npi => &self.npi,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::Npi => &mut self.npi,
        };
        *slot = value.into();
    }

    /// Checks that are required before the record may be sent upstream.
    pub fn submission_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.first_name.trim().is_empty() {
            errors.push(FieldError::new(Field::FirstName, FieldProblem::Empty));
        }
        if self.last_name.trim().is_empty() {
            errors.push(FieldError::new(Field::LastName, FieldProblem::Empty));
        }
        if !npi_is_acceptable(&self.npi) {
            errors.push(FieldError::new(Field::Npi, FieldProblem::BadNpiLength));
        }
        errors
    }
}

/// An NPI is acceptable when it is empty or exactly ten characters long.
pub fn npi_is_acceptable(npi: &str) -> bool {
    npi.is_empty() || npi.chars().count() == NPI_LEN
}

/// Upstream source(s) a query targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointSelector {
    #[default]
    All,
    Kaiser,
    Humana,
    Cigna,
    PacificSource,
    Centene,
}

impl EndpointSelector {
    pub const ALL_VALUES: [EndpointSelector; 6] = [
        EndpointSelector::All,
        EndpointSelector::Kaiser,
        EndpointSelector::Humana,
        EndpointSelector::Cigna,
        EndpointSelector::PacificSource,
        EndpointSelector::Centene,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointSelector::All => "All",
            EndpointSelector::Kaiser => "Kaiser",
            EndpointSelector::Humana => "Humana",
            EndpointSelector::Cigna => "Cigna",
            EndpointSelector::PacificSource => "PacificSource",
            EndpointSelector::Centene => "Centene",
        }
    }
}

impl fmt::Display for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL_VALUES
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL_VALUES.iter().map(|v| v.as_str()).collect();
                format!("unknown endpoint {wanted:?} (expected one of {})", names.join(", "))
            })
    }
}

/// The in-progress batch plus query-level options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryBatch {
    pub practitioners: Vec<PractitionerRecord>,
    pub endpoint: EndpointSelector,
    pub consensus: bool,
}

impl Default for QueryBatch {
    fn default() -> Self {
        Self {
            practitioners: vec![PractitionerRecord::default()],
            endpoint: EndpointSelector::default(),
            consensus: true,
        }
    }
}

impl QueryBatch {
    pub fn len(&self) -> usize {
        self.practitioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.practitioners.is_empty()
    }

    /// Validates every record for submission. Errors carry the record index.
    pub fn finalize(&self) -> Result<&[PractitionerRecord], Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .practitioners
            .iter()
            .enumerate()
            .flat_map(|(index, record)| {
                record
                    .submission_errors()
                    .into_iter()
                    .map(move |err| err.at(index))
            })
            .collect();
        if errors.is_empty() {
            Ok(&self.practitioners)
        } else {
            Err(errors)
        }
    }
}

/// Validates one candidate record taken from structured input.
pub fn validate_record(candidate: &Value) -> Result<PractitionerRecord, Vec<FieldError>> {
    let Some(object) = candidate.as_object() else {
        return Err(Field::ALL
            .iter()
            .map(|field| FieldError::new(*field, FieldProblem::Missing))
            .collect());
    };

    let mut errors = Vec::new();
    let mut take = |field: Field| -> String {
        match object.get(field.key()) {
            None => {
                errors.push(FieldError::new(field, FieldProblem::Missing));
                String::new()
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                errors.push(FieldError::new(field, FieldProblem::NotAString));
                String::new()
            }
        }
    };
    let first_name = take(Field::FirstName);
    let last_name = take(Field::LastName);
    let npi = take(Field::Npi);

    if !npi_is_acceptable(&npi) {
        errors.push(FieldError::new(Field::Npi, FieldProblem::BadNpiLength));
    }

    if errors.is_empty() {
        Ok(PractitionerRecord {
            first_name,
            last_name,
            npi,
        })
    } else {
        Err(errors)
    }
}

/// Validates a whole `{"practitioners": [...]}` payload. Any invalid record
/// rejects the payload.
pub fn validate_batch_shape(candidate: &Value) -> Result<Vec<PractitionerRecord>, IngestError> {
    let list = candidate
        .get("practitioners")
        .ok_or_else(|| IngestError::FormatMismatch("missing \"practitioners\" field".into()))?
        .as_array()
        .ok_or_else(|| IngestError::FormatMismatch("\"practitioners\" is not a list".into()))?;
    if list.is_empty() {
        return Err(IngestError::FormatMismatch(
            "\"practitioners\" is empty".into(),
        ));
    }

    let mut records = Vec::with_capacity(list.len());
    for (index, item) in list.iter().enumerate() {
        match validate_record(item) {
            Ok(record) => records.push(record),
            Err(errors) => {
                let detail: Vec<String> = errors.into_iter().map(|e| e.at(index).to_string()).collect();
                return Err(IngestError::FormatMismatch(detail.join("; ")));
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_with_all_string_fields_is_valid() {
        let record = validate_record(&json!({
            "npi": "1234567890",
            "first_name": "John",
            "last_name": "Doe"
        }))
        .unwrap();
        assert_eq!(record, PractitionerRecord::new("John", "Doe", "1234567890"));
    }

    #[test]
    fn empty_npi_is_allowed_by_the_record_validator() {
        let record = validate_record(&json!({"npi": "", "first_name": "A", "last_name": "B"}));
        assert!(record.is_ok());
    }

    #[test]
    fn record_reports_every_bad_field() {
        let errors = validate_record(&json!({"npi": 1234567890, "first_name": "A"})).unwrap_err();
        assert!(errors.contains(&FieldError::new(Field::Npi, FieldProblem::NotAString)));
        assert!(errors.contains(&FieldError::new(Field::LastName, FieldProblem::Missing)));
        assert!(!errors.iter().any(|e| e.field == Field::FirstName));
    }

    #[test]
    fn short_npi_fails_record_validation() {
        let errors =
            validate_record(&json!({"npi": "123", "first_name": "A", "last_name": "B"})).unwrap_err();
        assert_eq!(errors, vec![FieldError::new(Field::Npi, FieldProblem::BadNpiLength)]);
    }

    #[test]
    fn batch_shape_rejects_whole_payload_on_one_bad_record() {
        let payload = json!({"practitioners": [
            {"npi": "1234567890", "first_name": "John", "last_name": "Doe"},
            {"npi": "0987654321", "first_name": "Jane"}
        ]});
        let err = validate_batch_shape(&payload).unwrap_err();
        assert_eq!(err.reason(), "format-mismatch");
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn batch_shape_requires_non_empty_list() {
        assert!(validate_batch_shape(&json!({"practitioners": []})).is_err());
        assert!(validate_batch_shape(&json!({"practitioners": {}})).is_err());
        assert!(validate_batch_shape(&json!([])).is_err());
    }

    #[test]
    fn endpoint_parses_case_insensitively() {
        assert_eq!("pacificsource".parse::<EndpointSelector>(), Ok(EndpointSelector::PacificSource));
        assert_eq!("All".parse::<EndpointSelector>(), Ok(EndpointSelector::All));
        assert!("Aetna".parse::<EndpointSelector>().is_err());
    }

    #[test]
    fn default_batch_has_one_blank_record() {
        let batch = QueryBatch::default();
        assert_eq!(batch.practitioners, vec![PractitionerRecord::default()]);
        assert_eq!(batch.endpoint, EndpointSelector::All);
        assert!(batch.consensus);
    }

    #[test]
    fn finalize_reports_indexed_errors() {
        let batch = QueryBatch {
            practitioners: vec![
                PractitionerRecord::new("John", "Doe", "1234567890"),
                PractitionerRecord::new("", "Roe", "12"),
            ],
            ..QueryBatch::default()
        };
        let errors = batch.finalize().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.index == Some(1)));
    }
}
