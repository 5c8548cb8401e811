//! Transaction isolation levels

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Isolation levels supported by the store, ordered weakest to strongest.
///
/// - `None`: reads see the latest committed state plus own writes, no guarantees
/// - `ReadCommitted`: same visibility as `None`, never sees uncommitted writes
/// - `SnapshotRead`: reads come from the snapshot taken at `begin`
/// - `Snapshot`: snapshot reads; concurrent writers are not checked against
///   each other, so write skew is possible
/// - `Serializable`: snapshot reads plus first-committer-wins at commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// No isolation
    None,
    /// Read committed
    ReadCommitted,
    /// Snapshot reads
    SnapshotRead,
    /// Snapshot isolation
    Snapshot,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// True if reads are pinned to the state at `begin`
    pub fn reads_from_snapshot(self) -> bool {
        self >= IsolationLevel::SnapshotRead
    }

    /// Config/CLI spelling
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationLevel::None => "none",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::SnapshotRead => "snapshot-read",
            IsolationLevel::Snapshot => "snapshot",
            IsolationLevel::Serializable => "serializable",
        }
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::SnapshotRead
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(IsolationLevel::None),
            "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "snapshot-read" => Ok(IsolationLevel::SnapshotRead),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(Error::invalid_input(format!(
                "unknown isolation level '{}'",
                other
            ))),
        }
    }
}
