//! Layer 1 — Shape: structural typing and declared ranges.

use chrono::{DateTime, FixedOffset};
use eld_types::{EventType, FieldError, RecordOrigin, RecordStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The wire shape of an inbound event submission. Loosely typed on
/// purpose — numeric tags are plain integers here so the shape layer can
/// produce a field-level error instead of a generic deserialize failure
/// when they fall outside their declared range. `Serialize` lets the HTTP
/// layer re-serialize the parsed input as the vault's raw payload without
/// holding onto the original request bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventInput {
    pub carrier_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub device_id: Option<Uuid>,
    pub event_type: u8,
    pub event_sub_type: u8,
    #[serde(default = "default_record_origin")]
    pub record_origin: u8,
    /// Absent means the event is a fresh active record — the common case.
    /// A client that supplies one is asserting a specific lifecycle state;
    /// layer 1 only checks it is in the declared range, business rules
    /// decide what this service accepts (see `validate_business_rules`).
    pub record_status: Option<u8>,
    pub event_timestamp: String,
    pub event_sequence_id: Option<u32>,
    pub accumulated_vehicle_miles: f64,
    pub elapsed_engine_hours: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_description: Option<String>,
    #[serde(default)]
    pub malfunction_indicator: bool,
    #[serde(default)]
    pub diagnostic_indicator: bool,
}

fn default_record_origin() -> u8 {
    RecordOrigin::Automatic.code()
}

/// The event after layer-1 acceptance: every field is now in its declared
/// range and typed.
#[derive(Debug, Clone)]
pub struct ValidatedShape {
    pub carrier_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub device_id: Option<Uuid>,
    pub event_type: EventType,
    pub event_sub_type: u8,
    pub record_origin: RecordOrigin,
    pub record_status: RecordStatus,
    pub event_timestamp: DateTime<FixedOffset>,
    pub event_sequence_id: Option<u32>,
    pub odometer_tenths: i64,
    pub engine_hours_tenths: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_description: Option<String>,
    pub malfunction_indicator: bool,
    pub diagnostic_indicator: bool,
}

pub fn validate_shape(input: &RawEventInput) -> Result<ValidatedShape, Vec<FieldError>> {
    let mut errors = Vec::new();

    let event_type = EventType::from_code(input.event_type);
    if event_type.is_none() {
        errors.push(FieldError::new(
            "eventType",
            "OUT_OF_RANGE",
            format!("event type {} is not one of 1..=7", input.event_type),
        ));
    }

    let record_origin = RecordOrigin::from_code(input.record_origin);
    if record_origin.is_none() {
        errors.push(FieldError::new(
            "recordOrigin",
            "OUT_OF_RANGE",
            format!("record origin {} is not one of 1..=4", input.record_origin),
        ));
    }

    let record_status = match input.record_status {
        Some(code) => match RecordStatus::from_code(code) {
            Some(status) => Some(status),
            None => {
                errors.push(FieldError::new(
                    "recordStatus",
                    "OUT_OF_RANGE",
                    format!("record status {code} is not one of 1..=4"),
                ));
                None
            }
        },
        None => Some(RecordStatus::Active),
    };

    if let Some(lat) = input.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            errors.push(FieldError::new("latitude", "OUT_OF_RANGE", "latitude must be in [-90, 90]"));
        }
    }
    if let Some(lon) = input.longitude {
        if !(-180.0..=180.0).contains(&lon) {
            errors.push(FieldError::new("longitude", "OUT_OF_RANGE", "longitude must be in [-180, 180]"));
        }
    }

    if input.accumulated_vehicle_miles < 0.0 {
        errors.push(FieldError::new(
            "accumulatedVehicleMiles",
            "OUT_OF_RANGE",
            "odometer reading must be >= 0",
        ));
    }
    if input.elapsed_engine_hours < 0.0 {
        errors.push(FieldError::new(
            "elapsedEngineHours",
            "OUT_OF_RANGE",
            "engine hours must be >= 0",
        ));
    }

    let event_timestamp = DateTime::parse_from_rfc3339(&input.event_timestamp);
    if event_timestamp.is_err() {
        errors.push(FieldError::new(
            "eventTimestamp",
            "INVALID_FORMAT",
            "event timestamp must be ISO-8601",
        ));
    }

    if input.latitude.is_none() && input.longitude.is_none() {
        let has_description = input
            .location_description
            .as_ref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false);
        if !has_description {
            errors.push(FieldError::new(
                "locationDescription",
                "REQUIRED",
                "locationDescription is required when latitude and longitude are both absent",
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedShape {
        carrier_id: input.carrier_id,
        driver_id: input.driver_id,
        vehicle_id: input.vehicle_id,
        device_id: input.device_id,
        event_type: event_type.expect("checked above"),
        event_sub_type: input.event_sub_type,
        record_origin: record_origin.expect("checked above"),
        record_status: record_status.expect("checked above"),
        event_timestamp: event_timestamp.expect("checked above"),
        event_sequence_id: input.event_sequence_id,
        odometer_tenths: (input.accumulated_vehicle_miles * 10.0).round() as i64,
        engine_hours_tenths: (input.elapsed_engine_hours * 10.0).round() as i64,
        latitude: input.latitude,
        longitude: input.longitude,
        location_description: input.location_description.clone(),
        malfunction_indicator: input.malfunction_indicator,
        diagnostic_indicator: input.diagnostic_indicator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> RawEventInput {
        RawEventInput {
            carrier_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            device_id: Some(Uuid::new_v4()),
            event_type: 1,
            event_sub_type: 3,
            record_origin: 2,
            record_status: None,
            event_timestamp: "2026-02-15T12:00:00-05:00".to_string(),
            event_sequence_id: Some(1),
            accumulated_vehicle_miles: 1000.0,
            elapsed_engine_hours: 100.0,
            latitude: Some(37.77),
            longitude: Some(-122.42),
            location_description: None,
            malfunction_indicator: false,
            diagnostic_indicator: false,
        }
    }

    #[test]
    fn accepts_well_formed_input() {
        assert!(validate_shape(&valid_input()).is_ok());
    }

    #[test]
    fn rejects_event_type_out_of_range() {
        let mut input = valid_input();
        input.event_type = 9;
        let errors = validate_shape(&input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "eventType"));
    }

    #[test]
    fn absent_record_status_defaults_to_active() {
        let shape = validate_shape(&valid_input()).unwrap();
        assert_eq!(shape.record_status, eld_types::RecordStatus::Active);
    }

    #[test]
    fn rejects_record_status_out_of_range() {
        let mut input = valid_input();
        input.record_status = Some(9);
        let errors = validate_shape(&input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "recordStatus"));
    }

    #[test]
    fn rejects_latitude_out_of_range() {
        let mut input = valid_input();
        input.latitude = Some(91.0);
        let errors = validate_shape(&input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "latitude"));
    }

    #[test]
    fn requires_location_description_without_coordinates() {
        let mut input = valid_input();
        input.latitude = None;
        input.longitude = None;
        input.location_description = None;
        let errors = validate_shape(&input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "locationDescription"));
    }

    #[test]
    fn accepts_description_in_place_of_coordinates() {
        let mut input = valid_input();
        input.latitude = None;
        input.longitude = None;
        input.location_description = Some("Yard 3".to_string());
        assert!(validate_shape(&input).is_ok());
    }

    #[test]
    fn rejects_malformed_timestamp() {
        let mut input = valid_input();
        input.event_timestamp = "not-a-timestamp".to_string();
        let errors = validate_shape(&input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "eventTimestamp"));
    }
}
