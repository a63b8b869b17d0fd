use std::fmt;

const NAMESPACE: &str = "dieselsync";

/// Logical keys of the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Machines,
    Logs,
    Inventory,
    Alerts,
    ConnectionStatus,
    OfflineQueue,
    /// Mutations whose replay budget ran out
    FailedMutations,
    DeletionAudit,
}

impl CacheKey {
    pub const ALL: [CacheKey; 8] = [
        CacheKey::Machines,
        CacheKey::Logs,
        CacheKey::Inventory,
        CacheKey::Alerts,
        CacheKey::ConnectionStatus,
        CacheKey::OfflineQueue,
        CacheKey::FailedMutations,
        CacheKey::DeletionAudit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CacheKey::Machines => "machines",
            CacheKey::Logs => "logs",
            CacheKey::Inventory => "inventory",
            CacheKey::Alerts => "alerts",
            CacheKey::ConnectionStatus => "connection_status",
            CacheKey::OfflineQueue => "offline_queue",
            CacheKey::FailedMutations => "failed_mutations",
            CacheKey::DeletionAudit => "deletion_audit",
        }
    }

    /// Namespaced storage key
    pub fn storage_key(self) -> String {
        format!("{}:{}", NAMESPACE, self.name())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
