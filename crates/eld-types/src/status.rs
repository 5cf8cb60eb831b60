//! Lifecycle status enums, stored as text columns in Postgres.
//!
//! Each is a closed Rust enum with `as_str`/`parse` pairs, persisted as
//! plain `TEXT` so ad-hoc SQL (`WHERE status = 'pending'`) stays readable
//! in migrations and ops queries.

use std::fmt;

/// Processing status of a raw vault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Received,
    Processed,
    Rejected,
    Failed,
}

impl VaultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "received" => Self::Received,
            "processed" => Self::Processed,
            "rejected" => Self::Rejected,
            "failed" => Self::Failed,
            _ => return None,
        })
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    InFlight,
    Completed,
}

impl IdempotencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "in_flight" => Self::InFlight,
            "completed" => Self::Completed,
            _ => return None,
        })
    }
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a dead-letter queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlqStatus {
    Pending,
    Retrying,
    Resolved,
    Discarded,
}

impl DlqStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "retrying" => Self::Retrying,
            "resolved" => Self::Resolved,
            "discarded" => Self::Discarded,
            _ => return None,
        })
    }
}

impl fmt::Display for DlqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a log-period (driver-day) scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPeriodStatus {
    Active,
    Certified,
    Recertified,
    Rejected,
}

impl LogPeriodStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Certified => "certified",
            Self::Recertified => "recertified",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "active" => Self::Active,
            "certified" => Self::Certified,
            "recertified" => Self::Recertified,
            "rejected" => Self::Rejected,
            _ => return None,
        })
    }
}

impl fmt::Display for LogPeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_status_roundtrips() {
        for status in [
            DlqStatus::Pending,
            DlqStatus::Retrying,
            DlqStatus::Resolved,
            DlqStatus::Discarded,
        ] {
            assert_eq!(DlqStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DlqStatus::parse("bogus"), None);
    }

    #[test]
    fn vault_status_roundtrips() {
        for status in [
            VaultStatus::Received,
            VaultStatus::Processed,
            VaultStatus::Rejected,
            VaultStatus::Failed,
        ] {
            assert_eq!(VaultStatus::parse(status.as_str()), Some(status));
        }
    }
}
