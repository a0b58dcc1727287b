use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single visit.
///
/// Belongs to exactly one patient, is authored by exactly one doctor and is
/// scoped to one hospital. `hospital_id` always matches the authoring
/// doctor's hospital at creation time; `visit_date` is immutable.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub complaint: String,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub lab_results: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    pub visit_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a record. The authoring doctor and hospital are
/// taken from the caller, never from the payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub complaint: String,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub lab_results: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    pub visit_date: DateTime<Utc>,
}

/// Clinical fields the authoring doctor (or admin) may revise.
/// `visit_date` and the patient/doctor/hospital links are not updatable.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MedicalRecordUpdate {
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub lab_results: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
}

/// Measurements taken during a visit. Append-only once created.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct VitalSigns {
    pub id: Uuid,
    pub record_id: Uuid,
    /// Doctor or nurse who took the measurements.
    pub recorded_by: Uuid,
    /// Degrees Celsius.
    pub temperature: Option<f32>,
    pub systolic: Option<i16>,
    pub diastolic: Option<i16>,
    pub pulse: Option<i16>,
    pub respiration: Option<i16>,
    /// Kilograms.
    pub weight: Option<f32>,
    /// Metres.
    pub height: Option<f32>,
    /// Derived from weight and height, not client supplied.
    pub bmi: Option<f32>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NewVitalSigns {
    pub temperature: Option<f32>,
    pub systolic: Option<i16>,
    pub diastolic: Option<i16>,
    pub pulse: Option<i16>,
    pub respiration: Option<i16>,
    pub weight: Option<f32>,
    pub height: Option<f32>,
}

impl NewVitalSigns {
    ///
    /// Body mass index from weight (kg) and height (m), rounded to one
    /// decimal place. `None` unless both measurements are present and the
    /// height is positive.
    ///
    pub fn bmi(&self) -> Option<f32> {
        match (self.weight, self.height) {
            (Some(weight), Some(height)) if height > 0.0 => {
                Some(((weight / (height * height)) * 10.0).round() / 10.0)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmi_is_derived_when_both_measurements_present() {
        let vitals = NewVitalSigns {
            weight: Some(70.0),
            height: Some(1.75),
            ..Default::default()
        };
        assert_eq!(vitals.bmi(), Some(22.9));
    }

    #[test]
    fn bmi_is_none_without_measurements() {
        let vitals = NewVitalSigns {
            weight: Some(70.0),
            ..Default::default()
        };
        assert_eq!(vitals.bmi(), None);

        let vitals = NewVitalSigns {
            weight: Some(70.0),
            height: Some(0.0),
            ..Default::default()
        };
        assert_eq!(vitals.bmi(), None);
    }
}
