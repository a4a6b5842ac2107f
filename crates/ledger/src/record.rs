use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::LedgerError;

/// A ledger timestamp: seconds and nanoseconds since the Unix epoch, UTC.
///
/// Every transaction carries one invocation timestamp fixed at `begin`. It is
/// identical for every read of that transaction, which is what makes the
/// timestamps recorded in provenance deterministic. Serialized as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl LedgerTimestamp {
    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        LedgerTimestamp {
            seconds: dt.unix_timestamp(),
            nanos: dt.nanosecond(),
        }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(OffsetDateTime::now_utc())
    }

    /// The smallest timestamp strictly after `self`.
    pub fn successor(self) -> Self {
        if self.nanos >= 999_999_999 {
            LedgerTimestamp {
                seconds: self.seconds + 1,
                nanos: 0,
            }
        } else {
            LedgerTimestamp {
                seconds: self.seconds,
                nanos: self.nanos + 1,
            }
        }
    }

    pub fn to_datetime(self) -> Result<OffsetDateTime, LedgerError> {
        let total = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanos);
        OffsetDateTime::from_unix_timestamp_nanos(total)
            .map_err(|e| LedgerError::Backend(format!("timestamp out of range: {e}")))
    }

    /// RFC 3339 rendering, e.g. `2025-01-01T00:00:00.5Z`.
    pub fn to_rfc3339(self) -> Result<String, LedgerError> {
        self.to_datetime()?
            .format(&Rfc3339)
            .map_err(|e| LedgerError::Backend(format!("timestamp format: {e}")))
    }

    pub fn parse_rfc3339(s: &str) -> Result<Self, LedgerError> {
        OffsetDateTime::parse(s, &Rfc3339)
            .map(Self::from_datetime)
            .map_err(|e| LedgerError::Backend(format!("invalid timestamp {s:?}: {e}")))
    }
}

impl fmt::Display for LedgerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}.{:09}", self.seconds, self.nanos),
        }
    }
}

impl Serialize for LedgerTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.to_rfc3339().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for LedgerTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LedgerTimestamp::parse_rfc3339(&s).map_err(serde::de::Error::custom)
    }
}

/// One committed modification of a key, as reported by the ledger's history
/// facility.
///
/// Deletions are recorded with `is_delete = true` and an empty `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: LedgerTimestamp,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// Returned by a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub tx_id: String,
    /// `None` only for a read-only transaction begun without a timestamp.
    pub timestamp: Option<LedgerTimestamp>,
    /// Number of keys written or deleted by the transaction.
    pub writes: usize,
}
