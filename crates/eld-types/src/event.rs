//! Event classification types.
//!
//! The FMCSA event schema is seven disjoint sub-shapes keyed by event type.
//! We model the tag and its valid sub-type table here as a closed enum
//! rather than a flat struct with many nullable fields — the nullables
//! reserved for fields that really are optional by regulation (lat/lon,
//! annotations) live on `eld_core::pipeline::NewEventRequest`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven FMCSA event types (49 CFR §395.26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EventType {
    /// Duty status change
    DutyStatus = 1,
    /// Intermediate log
    Intermediate = 2,
    /// Driver's certification
    Certification = 3,
    /// Login/logout
    LoginLogout = 4,
    /// CMV engine power up/shut down
    EnginePower = 5,
    /// Malfunction/diagnostic
    MalfunctionDiagnostic = 6,
    /// Special driving category / other
    Special = 7,
}

impl EventType {
    /// Parse from the wire code in `[1, 7]`.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::DutyStatus,
            2 => Self::Intermediate,
            3 => Self::Certification,
            4 => Self::LoginLogout,
            5 => Self::EnginePower,
            6 => Self::MalfunctionDiagnostic,
            7 => Self::Special,
            _ => return None,
        })
    }

    /// The wire code for this event type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The event-sub-type codes FMCSA allows for this event type.
    pub fn valid_sub_types(self) -> &'static [u8] {
        match self {
            Self::DutyStatus => &[1, 2, 3, 4],
            Self::Intermediate => &[1, 2],
            Self::Certification => &[1, 2, 3],
            Self::LoginLogout => &[1, 2],
            Self::EnginePower => &[1, 2, 3],
            Self::MalfunctionDiagnostic => &[1, 2],
            Self::Special => &[1, 2, 3, 4, 5, 6, 7],
        }
    }

    /// Whether `sub_type` is valid for this event type.
    pub fn accepts_sub_type(self, sub_type: u8) -> bool {
        self.valid_sub_types().contains(&sub_type)
    }
}

impl TryFrom<u8> for EventType {
    type Error = InvalidEventType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(InvalidEventType(value))
    }
}

impl From<EventType> for u8 {
    fn from(value: EventType) -> Self {
        value.code()
    }
}

/// The submitted code did not match any of the seven FMCSA event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEventType(pub u8);

impl fmt::Display for InvalidEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event type {} is not one of 1..=7", self.0)
    }
}

impl std::error::Error for InvalidEventType {}

/// Record status: whether this row is the currently active version of the
/// event and, if not, why it was superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecordStatus {
    Active = 1,
    InactiveChanged = 2,
    InactiveChangeRequested = 3,
    InactiveUnidentified = 4,
}

impl RecordStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Active,
            2 => Self::InactiveChanged,
            3 => Self::InactiveChangeRequested,
            4 => Self::InactiveUnidentified,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl TryFrom<u8> for RecordStatus {
    type Error = InvalidRecordStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(InvalidRecordStatus(value))
    }
}

impl From<RecordStatus> for u8 {
    fn from(value: RecordStatus) -> Self {
        value.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRecordStatus(pub u8);

impl fmt::Display for InvalidRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record status {} is not one of 1..=4", self.0)
    }
}

impl std::error::Error for InvalidRecordStatus {}

/// Who or what produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecordOrigin {
    Automatic = 1,
    Driver = 2,
    OtherUser = 3,
    Unidentified = 4,
}

impl RecordOrigin {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Automatic,
            2 => Self::Driver,
            3 => Self::OtherUser,
            4 => Self::Unidentified,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RecordOrigin {
    type Error = InvalidRecordOrigin;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(InvalidRecordOrigin(value))
    }
}

impl From<RecordOrigin> for u8 {
    fn from(value: RecordOrigin) -> Self {
        value.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRecordOrigin(pub u8);

impl fmt::Display for InvalidRecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record origin {} is not one of 1..=4", self.0)
    }
}

impl std::error::Error for InvalidRecordOrigin {}

/// Sequence ID: an integer in `[1, 65535]`, monotonically allocated per
/// scope per active event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(u32);

impl SequenceId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 65_535;

    /// Validate and wrap a candidate sequence number.
    pub fn new(value: u32) -> Result<Self, SequenceIdOutOfRange> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SequenceIdOutOfRange(value))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceIdOutOfRange(pub u32);

impl fmt::Display for SequenceIdOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence id {} is outside [1, 65535]", self.0)
    }
}

impl std::error::Error for SequenceIdOutOfRange {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_sub_type_tables_match_fmcsa() {
        assert_eq!(EventType::DutyStatus.valid_sub_types(), &[1, 2, 3, 4]);
        assert_eq!(EventType::Intermediate.valid_sub_types(), &[1, 2]);
        assert_eq!(EventType::Special.valid_sub_types(), &[1, 2, 3, 4, 5, 6, 7]);
        assert!(EventType::DutyStatus.accepts_sub_type(4));
        assert!(!EventType::DutyStatus.accepts_sub_type(5));
    }

    #[test]
    fn event_type_rejects_out_of_range_code() {
        assert!(EventType::try_from(0u8).is_err());
        assert!(EventType::try_from(8u8).is_err());
        assert!(EventType::try_from(1u8).is_ok());
        assert!(EventType::try_from(7u8).is_ok());
    }

    #[test]
    fn sequence_id_boundaries() {
        assert!(SequenceId::new(0).is_err());
        assert!(SequenceId::new(1).is_ok());
        assert!(SequenceId::new(65_535).is_ok());
        assert!(SequenceId::new(65_536).is_err());
    }

    #[test]
    fn record_status_active_check() {
        assert!(RecordStatus::Active.is_active());
        assert!(!RecordStatus::InactiveChanged.is_active());
    }
}
