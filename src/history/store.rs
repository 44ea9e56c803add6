//! PostgreSQL store for tenant conversation turns.

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::db::ConversationStore;
use crate::error::StoreError;
use crate::history::{Turn, TurnRole};
use crate::tenant::TenantId;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Conversation store backed by a PostgreSQL connection pool.
///
/// Every statement that touches `turns` runs inside a transaction that binds
/// `app.tenant_id`, so the row-level-security policy scopes the transaction
/// to exactly one tenant in addition to the explicit `WHERE` clauses.
pub struct Store {
    pool: Pool,
}

impl Store {
    /// Create a new store. Connections are established lazily, so the
    /// health probe can still report an unreachable database instead of
    /// failing at startup.
    pub fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self { pool })
    }

    /// Run embedded database migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let report = embedded::migrations::runner().run_async(&mut **conn).await?;
        for migration in report.applied_migrations() {
            tracing::info!(%migration, "applied migration");
        }
        Ok(())
    }

    /// Get a connection from the pool.
    async fn conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl ConversationStore for Store {
    async fn fetch_recent_turns(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            "SELECT set_config('app.tenant_id', $1, true)",
            &[&tenant.as_str()],
        )
        .await?;

        let rows = tx
            .query(
                r#"
                SELECT tenant_id, seq, role, content, created_at
                FROM turns
                WHERE tenant_id = $1
                ORDER BY seq DESC
                LIMIT $2
                "#,
                &[&tenant.as_str(), &(limit as i64)],
            )
            .await?;

        tx.commit().await?;

        // Newest-first from the index scan; callers want oldest-first.
        rows.iter()
            .rev()
            .map(|row| {
                let role_str: String = row.get("role");
                let role = TurnRole::parse(&role_str).ok_or_else(|| {
                    StoreError::Decode(format!("unknown turn role {role_str:?}"))
                })?;
                Ok(Turn {
                    tenant: row.get("tenant_id"),
                    seq: row.get("seq"),
                    role,
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn append_exchange(
        &self,
        tenant: &TenantId,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            "SELECT set_config('app.tenant_id', $1, true)",
            &[&tenant.as_str()],
        )
        .await?;

        // Serialize sequence assignment per tenant for the rest of this
        // transaction. Concurrent writers for the same tenant queue here;
        // different tenants do not contend.
        tx.execute(
            "SELECT pg_advisory_xact_lock(hashtext($1)::bigint)",
            &[&tenant.as_str()],
        )
        .await?;

        let row = tx
            .query_one(
                "SELECT COALESCE(MAX(seq), 0) FROM turns WHERE tenant_id = $1",
                &[&tenant.as_str()],
            )
            .await?;
        let last_seq: i64 = row.get(0);

        let insert = tx
            .prepare("INSERT INTO turns (tenant_id, seq, role, content) VALUES ($1, $2, $3, $4)")
            .await?;

        tx.execute(
            &insert,
            &[
                &tenant.as_str(),
                &(last_seq + 1),
                &TurnRole::User.as_str(),
                &user_text,
            ],
        )
        .await?;
        tx.execute(
            &insert,
            &[
                &tenant.as_str(),
                &(last_seq + 2),
                &TurnRole::Assistant.as_str(),
                &assistant_text,
            ],
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(
            tenant = %tenant,
            user_seq = last_seq + 1,
            assistant_seq = last_seq + 2,
            "recorded exchange"
        );

        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let conn = self.conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}
