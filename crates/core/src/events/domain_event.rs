//! Domain event types.

use serde::{Deserialize, Serialize};

/// Domain events emitted by the engine after successful mutations.
///
/// These events represent facts about derived-data changes. Runtime
/// adapters translate them into platform-specific actions (UI refresh,
/// cache invalidation, downstream exports).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Movements were imported or deleted.
    MovementsChanged {
        account_ids: Vec<String>,
        instrument_ids: Vec<String>,
    },

    /// Operations were regenerated for the given accounts.
    OperationsChanged { account_ids: Vec<String> },

    /// Snapshots were created or updated.
    SnapshotsChanged {
        account_ids: Vec<String>,
        instrument_ids: Vec<String>,
    },
}

impl DomainEvent {
    /// Creates a MovementsChanged event.
    pub fn movements_changed(account_ids: Vec<String>, instrument_ids: Vec<String>) -> Self {
        Self::MovementsChanged {
            account_ids,
            instrument_ids,
        }
    }

    /// Creates an OperationsChanged event.
    pub fn operations_changed(account_ids: Vec<String>) -> Self {
        Self::OperationsChanged { account_ids }
    }

    /// Creates a SnapshotsChanged event.
    pub fn snapshots_changed(account_ids: Vec<String>, instrument_ids: Vec<String>) -> Self {
        Self::SnapshotsChanged {
            account_ids,
            instrument_ids,
        }
    }
}
