//! Layer 2 — Business rules: pure, synchronous checks that don't need
//! the database.

use chrono::{Duration, Utc};
use eld_types::{FieldError, RecordStatus};

use super::shape::ValidatedShape;

/// Alias: a shape that has also passed business-rule validation. Kept
/// distinct from `ValidatedShape` at the type level would add ceremony
/// without changing behavior here, since business rules only ever reject
/// (never transform) the shape.
pub type ValidatedEvent = ValidatedShape;

const MAX_FUTURE_SKEW: Duration = Duration::minutes(5);
const MAX_PAST_SKEW_DAYS: i64 = 14;

/// Single-event business rules: sub-type table, timestamp window, and
/// non-negative readings (re-asserted here independently of layer 1, since
/// the two layers are meant to be independently complete).
pub fn validate_business_rules(shape: &ValidatedShape, previous: Option<&ValidatedShape>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if shape.record_status != RecordStatus::Active {
        errors.push(FieldError::new(
            "recordStatus",
            "RECORD_STATUS_NOT_SUPPORTED",
            "this endpoint only accepts active records; corrections to existing events are not supported here",
        ));
    }

    if !shape.event_type.accepts_sub_type(shape.event_sub_type) {
        errors.push(FieldError::new(
            "eventSubType",
            "INVALID_FOR_EVENT_TYPE",
            format!(
                "sub-type {} is not valid for event type {:?}",
                shape.event_sub_type, shape.event_type
            ),
        ));
    }

    let now = Utc::now();
    let event_time_utc = shape.event_timestamp.with_timezone(&Utc);
    if event_time_utc - now > MAX_FUTURE_SKEW {
        errors.push(FieldError::new(
            "eventTimestamp",
            "TOO_FAR_IN_FUTURE",
            "event timestamp is more than 5 minutes ahead of server time",
        ));
    }
    if now - event_time_utc > Duration::days(MAX_PAST_SKEW_DAYS) {
        errors.push(FieldError::new(
            "eventTimestamp",
            "TOO_FAR_IN_PAST",
            "event timestamp is more than 14 days behind server time",
        ));
    }

    if shape.odometer_tenths < 0 {
        errors.push(FieldError::new(
            "accumulatedVehicleMiles",
            "OUT_OF_RANGE",
            "accumulatedVehicleMiles must be >= 0",
        ));
    }
    if shape.engine_hours_tenths < 0 {
        errors.push(FieldError::new(
            "elapsedEngineHours",
            "OUT_OF_RANGE",
            "elapsedEngineHours must be >= 0",
        ));
    }

    if let Some(previous) = previous {
        if shape.odometer_tenths < previous.odometer_tenths {
            errors.push(FieldError::new(
                "accumulatedVehicleMiles",
                "NON_MONOTONIC",
                format!(
                    "odometer decreased from {} to {} within the batch",
                    previous.odometer_tenths as f64 / 10.0,
                    shape.odometer_tenths as f64 / 10.0
                ),
            ));
        }
        if shape.engine_hours_tenths < previous.engine_hours_tenths {
            errors.push(FieldError::new(
                "elapsedEngineHours",
                "NON_MONOTONIC",
                format!(
                    "engine hours decreased from {} to {} within the batch",
                    previous.engine_hours_tenths as f64 / 10.0,
                    shape.engine_hours_tenths as f64 / 10.0
                ),
            ));
        }
    }

    errors
}

/// Batch monotonicity: sort by timestamp, then require
/// `accumulatedVehicleMiles`/`elapsedEngineHours` non-decreasing. Returns
/// errors keyed by each event's original batch index.
pub fn validate_batch_monotonicity(
    events: &[(usize, ValidatedShape)],
) -> std::collections::HashMap<usize, Vec<FieldError>> {
    let mut ordered: Vec<&(usize, ValidatedShape)> = events.iter().collect();
    ordered.sort_by_key(|(_, e)| e.event_timestamp);

    let mut errors_by_index: std::collections::HashMap<usize, Vec<FieldError>> = std::collections::HashMap::new();
    let mut previous: Option<&ValidatedShape> = None;
    for (index, event) in &ordered {
        let errors = validate_business_rules(event, previous);
        // validate_business_rules also re-checks sub-type/timestamp window,
        // which the caller already ran once per event outside the batch
        // sort; only the monotonicity-specific errors are novel here.
        let monotonicity_errors: Vec<FieldError> = errors
            .into_iter()
            .filter(|e| e.code == "NON_MONOTONIC")
            .collect();
        if !monotonicity_errors.is_empty() {
            errors_by_index.entry(*index).or_default().extend(monotonicity_errors);
        }
        previous = Some(event);
    }
    errors_by_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use eld_types::{EventType, RecordOrigin};

    fn shape_with(event_timestamp: &str, odometer_tenths: i64, engine_hours_tenths: i64) -> ValidatedShape {
        ValidatedShape {
            carrier_id: uuid::Uuid::new_v4(),
            driver_id: uuid::Uuid::new_v4(),
            vehicle_id: uuid::Uuid::new_v4(),
            device_id: None,
            event_type: EventType::DutyStatus,
            event_sub_type: 1,
            record_origin: RecordOrigin::Driver,
            record_status: RecordStatus::Active,
            event_timestamp: DateTime::parse_from_rfc3339(event_timestamp).unwrap(),
            event_sequence_id: None,
            odometer_tenths,
            engine_hours_tenths,
            latitude: Some(0.0),
            longitude: Some(0.0),
            location_description: None,
            malfunction_indicator: false,
            diagnostic_indicator: false,
        }
    }

    #[test]
    fn rejects_non_active_record_status() {
        let mut shape = shape_with("2026-02-15T12:00:00-05:00", 1000, 100);
        shape.record_status = RecordStatus::InactiveChangeRequested;
        let errors = validate_business_rules(&shape, None);
        assert!(errors.iter().any(|e| e.code == "RECORD_STATUS_NOT_SUPPORTED"));
    }

    #[test]
    fn rejects_invalid_sub_type_for_event_type() {
        let mut shape = shape_with("2026-02-15T12:00:00-05:00", 1000, 100);
        shape.event_sub_type = 9;
        let errors = validate_business_rules(&shape, None);
        assert!(errors.iter().any(|e| e.field == "eventSubType"));
    }

    #[test]
    fn rejects_timestamp_more_than_five_minutes_future() {
        let future = (Utc::now() + Duration::minutes(6)).to_rfc3339();
        let shape = shape_with(&future, 1000, 100);
        let errors = validate_business_rules(&shape, None);
        assert!(errors.iter().any(|e| e.code == "TOO_FAR_IN_FUTURE"));
    }

    #[test]
    fn accepts_timestamp_just_under_five_minutes_future() {
        let future = (Utc::now() + Duration::minutes(5) - Duration::seconds(1)).to_rfc3339();
        let shape = shape_with(&future, 1000, 100);
        let errors = validate_business_rules(&shape, None);
        assert!(!errors.iter().any(|e| e.code == "TOO_FAR_IN_FUTURE"));
    }

    #[test]
    fn rejects_timestamp_more_than_fourteen_days_past() {
        let past = (Utc::now() - Duration::days(15)).to_rfc3339();
        let shape = shape_with(&past, 1000, 100);
        let errors = validate_business_rules(&shape, None);
        assert!(errors.iter().any(|e| e.code == "TOO_FAR_IN_PAST"));
    }

    #[test]
    fn batch_monotonicity_flags_decreasing_odometer() {
        let events = vec![
            (0, shape_with("2026-02-15T12:00:00-05:00", 50_000, 1_000)),
            (1, shape_with("2026-02-15T13:00:00-05:00", 40_000, 1_010)),
            (2, shape_with("2026-02-15T14:00:00-05:00", 55_000, 1_020)),
        ];
        let errors = validate_batch_monotonicity(&events);
        assert!(errors.contains_key(&1));
        assert!(!errors.contains_key(&0));
        assert!(!errors.contains_key(&2));
    }
}
