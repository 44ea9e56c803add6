//! Storage abstraction for tenant conversation history.
//!
//! The agent loop only sees this trait; the PostgreSQL implementation lives
//! in [`crate::history`]. Keeping the seam here lets tests swap in an
//! in-memory store and keeps the loop free of driver details.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::history::Turn;
use crate::tenant::TenantId;

/// Tenant-scoped persistence for conversation turns.
///
/// Implementations must enforce tenant scoping at the data-access layer, so
/// a defect in the caller cannot surface another tenant's rows. Writes are
/// never retried internally; blind retry of a write risks duplicate turns,
/// so that decision belongs to the caller.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Up to `limit` most recent turns for `tenant`, oldest first.
    async fn fetch_recent_turns(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Atomically record one exchange: the user turn, then the assistant
    /// turn, under a single transaction. Either both rows become visible or
    /// neither does.
    async fn append_exchange(
        &self,
        tenant: &TenantId,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), StoreError>;

    /// Trivial read-only probe for the health monitor.
    async fn health_check(&self) -> Result<(), StoreError>;
}
