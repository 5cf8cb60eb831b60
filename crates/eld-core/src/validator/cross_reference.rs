//! Layer 3 — Cross-reference: bulk-resolves referenced driver and vehicle
//! IDs in one round-trip per collection. Fails open on a database error
//! by default; configurable to fail strict (see DESIGN.md).

use eld_db::repos::ReferenceRepo;
use eld_types::FieldError;
use std::collections::{HashMap, HashSet};

use super::shape::ValidatedShape;
use crate::config::CrossReferenceMode;

pub struct CrossReferenceChecker {
    reference: ReferenceRepo,
}

impl CrossReferenceChecker {
    pub fn new(reference: ReferenceRepo) -> Self {
        Self { reference }
    }

    pub async fn check_one(&self, shape: &ValidatedShape, mode: CrossReferenceMode) -> Vec<FieldError> {
        self.check_batch(std::slice::from_ref(shape), mode)
            .await
            .remove(&0)
            .unwrap_or_default()
    }

    /// Bulk-resolve all driver/vehicle IDs referenced across `shapes` in
    /// two round-trips total (one per collection), returning errors keyed
    /// by each event's position in `shapes`.
    pub async fn check_batch(
        &self,
        shapes: &[ValidatedShape],
        mode: CrossReferenceMode,
    ) -> HashMap<usize, Vec<FieldError>> {
        let driver_ids: Vec<uuid::Uuid> = shapes.iter().map(|s| s.driver_id).collect();
        let vehicle_ids: Vec<uuid::Uuid> = shapes.iter().map(|s| s.vehicle_id).collect();

        let drivers = self.reference.existing_driver_ids(&driver_ids).await;
        let vehicles = self.reference.existing_vehicle_ids(&vehicle_ids).await;

        let mut errors: HashMap<usize, Vec<FieldError>> = HashMap::new();

        match (drivers, vehicles) {
            (Ok(drivers), Ok(vehicles)) => {
                for (index, shape) in shapes.iter().enumerate() {
                    self.check_resolved(index, shape, &drivers, &vehicles, &mut errors);
                }
            }
            (drivers_result, vehicles_result) => {
                let error = drivers_result.err().or(vehicles_result.err()).expect("one side failed");
                match mode {
                    CrossReferenceMode::FailOpen => {
                        tracing::warn!(error = %error, "cross-reference lookup failed, failing open");
                    }
                    CrossReferenceMode::Strict => {
                        for index in 0..shapes.len() {
                            errors.entry(index).or_default().push(FieldError::new(
                                "driverId",
                                "CROSS_REFERENCE_UNAVAILABLE",
                                "could not verify referenced entities and strict mode is enabled",
                            ));
                        }
                    }
                }
            }
        }

        errors
    }

    fn check_resolved(
        &self,
        index: usize,
        shape: &ValidatedShape,
        drivers: &HashSet<uuid::Uuid>,
        vehicles: &HashSet<uuid::Uuid>,
        errors: &mut HashMap<usize, Vec<FieldError>>,
    ) {
        if !drivers.contains(&shape.driver_id) {
            errors.entry(index).or_default().push(FieldError::new(
                "driverId",
                "NOT_FOUND",
                format!("driver {} does not exist", shape.driver_id),
            ));
        }
        if !vehicles.contains(&shape.vehicle_id) {
            errors.entry(index).or_default().push(FieldError::new(
                "vehicleId",
                "NOT_FOUND",
                format!("vehicle {} does not exist", shape.vehicle_id),
            ));
        }
    }
}
