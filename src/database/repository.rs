use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Port, PortChanges};

const PORT_COLUMNS: &str =
    "id, user_id, name, port_number, protocol, host, description, is_active, created_at, updated_at";

/// Storage seam for ports. Implementations do no validation or ownership
/// checks; `PortService` does both before calling in.
#[async_trait]
pub trait PortStore: Send + Sync {
    /// All ports owned by `user_id`, newest first
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Port>, DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Port>, DatabaseError>;

    async fn insert(&self, port: &Port) -> Result<Port, DatabaseError>;

    /// Apply `changes` and stamp `updated_at`. `None` if the row no longer exists.
    async fn update(
        &self,
        id: &str,
        changes: &PortChanges,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Port>, DatabaseError>;

    /// `true` if a row was removed
    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// Postgres-backed port store over the `ports` table
pub struct PgPortRepository {
    pool: PgPool,
}

impl PgPortRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortStore for PgPortRepository {
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Port>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM ports WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            PORT_COLUMNS
        );
        let ports = sqlx::query_as::<_, Port>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ports)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Port>, DatabaseError> {
        let sql = format!("SELECT {} FROM ports WHERE id = $1", PORT_COLUMNS);
        let port = sqlx::query_as::<_, Port>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(port)
    }

    async fn insert(&self, port: &Port) -> Result<Port, DatabaseError> {
        let sql = format!(
            "INSERT INTO ports ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {cols}",
            cols = PORT_COLUMNS
        );
        let created = sqlx::query_as::<_, Port>(&sql)
            .bind(&port.id)
            .bind(&port.user_id)
            .bind(&port.name)
            .bind(port.port_number)
            .bind(&port.protocol)
            .bind(&port.host)
            .bind(&port.description)
            .bind(port.is_active)
            .bind(port.created_at)
            .bind(port.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(
        &self,
        id: &str,
        changes: &PortChanges,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Port>, DatabaseError> {
        let mut builder = update_query(id, changes, updated_at);
        let updated = builder
            .build_query_as::<Port>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM ports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

/// UPDATE touching only the supplied columns
fn update_query<'a>(
    id: &'a str,
    changes: &'a PortChanges,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE ports SET updated_at = ");
    builder.push_bind(updated_at);

    if let Some(name) = &changes.name {
        builder.push(", name = ").push_bind(name);
    }
    if let Some(port_number) = changes.port_number {
        builder.push(", port_number = ").push_bind(port_number);
    }
    if let Some(protocol) = changes.protocol {
        builder.push(", protocol = ").push_bind(protocol.as_str());
    }
    if let Some(host) = &changes.host {
        builder.push(", host = ").push_bind(host);
    }
    if let Some(description) = &changes.description {
        builder.push(", description = ").push_bind(description.as_deref());
    }
    if let Some(is_active) = changes.is_active {
        builder.push(", is_active = ").push_bind(is_active);
    }

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING ").push(PORT_COLUMNS);
    builder
}
