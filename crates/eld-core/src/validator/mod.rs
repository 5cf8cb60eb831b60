//! Validator: three stacked layers. Layer 1 failures short-circuit;
//! layers 2 and 3 run together and their errors merge.

pub mod business;
pub mod cross_reference;
pub mod shape;

use eld_types::FieldError;
use std::collections::HashMap;

pub use business::ValidatedEvent;
pub use cross_reference::CrossReferenceChecker;
pub use shape::{RawEventInput, ValidatedShape};

use crate::config::CrossReferenceMode;

/// Run all three layers against a single raw event, with no neighbors to
/// check batch monotonicity against.
pub async fn validate_single(
    input: &RawEventInput,
    cross_reference: &CrossReferenceChecker,
    mode: CrossReferenceMode,
) -> Result<ValidatedEvent, Vec<FieldError>> {
    let shape = shape::validate_shape(input)?;

    let mut errors = business::validate_business_rules(&shape, None);
    errors.extend(cross_reference.check_one(&shape, mode).await);

    if errors.is_empty() {
        Ok(shape)
    } else {
        Err(errors)
    }
}

/// Run all three layers across a batch, merging batch monotonicity errors
/// (which need every event's neighbors) and bulk cross-reference errors
/// (which need every event's referenced IDs) into one pass. Returns a
/// `Result` per original batch index.
pub async fn validate_batch(
    inputs: &[RawEventInput],
    cross_reference: &CrossReferenceChecker,
    mode: CrossReferenceMode,
) -> Vec<Result<ValidatedEvent, Vec<FieldError>>> {
    let mut shapes: HashMap<usize, ValidatedShape> = HashMap::new();
    let mut errors_by_index: HashMap<usize, Vec<FieldError>> = HashMap::new();

    for (index, input) in inputs.iter().enumerate() {
        match shape::validate_shape(input) {
            Ok(shape) => {
                let business_errors = business::validate_business_rules(&shape, None);
                if !business_errors.is_empty() {
                    errors_by_index.entry(index).or_default().extend(business_errors);
                }
                shapes.insert(index, shape);
            }
            Err(shape_errors) => {
                errors_by_index.entry(index).or_default().extend(shape_errors);
            }
        }
    }

    let indexed_shapes: Vec<(usize, ValidatedShape)> =
        shapes.iter().map(|(i, s)| (*i, s.clone())).collect();
    for (index, errors) in business::validate_batch_monotonicity(&indexed_shapes) {
        errors_by_index.entry(index).or_default().extend(errors);
    }

    let ordered_shapes: Vec<ValidatedShape> = (0..inputs.len())
        .filter_map(|i| shapes.get(&i).cloned())
        .collect();
    let index_map: Vec<usize> = (0..inputs.len()).filter(|i| shapes.contains_key(i)).collect();
    let cross_reference_errors = cross_reference.check_batch(&ordered_shapes, mode).await;
    for (position, errors) in cross_reference_errors {
        let original_index = index_map[position];
        errors_by_index.entry(original_index).or_default().extend(errors);
    }

    (0..inputs.len())
        .map(|index| match errors_by_index.remove(&index) {
            Some(errors) if !errors.is_empty() => Err(errors),
            _ => Ok(shapes.remove(&index).expect("shape present when no errors recorded")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eld_db::Database;
    use uuid::Uuid;

    fn valid_input(odometer: f64) -> RawEventInput {
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
            accumulated_vehicle_miles: odometer,
            elapsed_engine_hours: 100.0,
            latitude: Some(37.77),
            longitude: Some(-122.42),
            location_description: None,
            malfunction_indicator: false,
            diagnostic_indicator: false,
        }
    }

    #[tokio::test]
    async fn shape_failure_short_circuits_before_cross_reference_runs() {
        let mut input = valid_input(1000.0);
        input.event_type = 9;
        // Lazy pool: never actually connects, so this only proves the
        // shape-layer `?` returns before the checker is touched.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused/unused")
            .expect("lazy pool construction does not dial the database");
        let checker = CrossReferenceChecker::new(eld_db::repos::ReferenceRepo::new(pool));
        let result = validate_single(&input, &checker, CrossReferenceMode::FailOpen).await;
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.field == "eventType"));
    }
}
