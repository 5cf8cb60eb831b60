//! Identity types for the ingestion core.
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID spaces (a device ID passed where a
//! driver ID is expected, etc.).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

define_id_type!(CarrierId, "Motor carrier operating the fleet");
define_id_type!(DriverId, "Driver the event is attributed to");
define_id_type!(VehicleId, "Vehicle the event was recorded on");
define_id_type!(DeviceId, "ELD device that submitted the event");
define_id_type!(ActorId, "Verified actor identity supplied by the auth layer");
define_id_type!(EventId, "Surrogate ID of an append-only event row");
define_id_type!(LogPeriodId, "Driver-day sequencing and certification scope");
define_id_type!(VaultRecordId, "Raw vault record of an inbound submission");
define_id_type!(DlqEntryId, "Dead-letter queue entry");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrips_through_uuid() {
        let uuid = Uuid::new_v4();
        let device = DeviceId::from_uuid(uuid);
        assert_eq!(Uuid::from(device), uuid);
        assert_eq!(device.to_string(), uuid.to_string());
    }

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(DeviceId::new(), DeviceId::new());
    }
}
