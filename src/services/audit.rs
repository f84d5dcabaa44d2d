use serde_json::Value;
use tracing::error;

use crate::db::Store;

/// Fire-and-forget audit trail writer. Failures are logged and swallowed so a
/// broken audit write can never fail the request that triggered it.
#[derive(Clone)]
pub struct AuditLogger {
    store: Store,
}

impl AuditLogger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append an audit record on a detached task. No-ops when there is no
    /// acting user id.
    pub fn record(&self, user_id: Option<i32>, action: &str, module_affected: &str, details: Value) {
        let Some(user_id) = user_id else {
            return;
        };

        let store = self.store.clone();
        let action = action.to_string();
        let module_affected = module_affected.to_string();
        let details = if details.is_null() {
            None
        } else {
            Some(details.to_string())
        };

        tokio::spawn(async move {
            if let Err(e) = store
                .add_audit_log(user_id, &action, &module_affected, details)
                .await
            {
                error!(error = %e, module = %module_affected, "Failed to write audit log");
            }
        });
    }
}
