//! # Service Repository
//!
//! Database operations for the service catalog.
//!
//! Services are soft-deleted: deactivation hides them from sale without
//! removing the row, so historical finance records keep resolving.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::rows::ServiceRow;
use vendo_core::Service;

const SERVICE_COLUMNS: &str = "id, name, description, price_cents, active, created_at";

/// Repository for service database operations.
#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    /// Creates a new ServiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    /// Lists all services, active or not, sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ServiceRow::into_domain).collect())
    }

    /// Lists only active services (the set offered for sale).
    pub async fn list_active(&self) -> DbResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ServiceRow::into_domain).collect())
    }

    /// Gets a service by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServiceRow::into_domain))
    }

    /// Inserts a new service.
    pub async fn insert(&self, service: &Service) -> DbResult<()> {
        debug!(id = %service.id, name = %service.name, "Inserting service");

        sqlx::query(
            "INSERT INTO services (id, name, description, price_cents, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price_cents)
        .bind(service.active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing service.
    pub async fn update(&self, service: &Service) -> DbResult<()> {
        debug!(id = %service.id, "Updating service");

        let result = sqlx::query(
            "UPDATE services SET name = ?2, description = ?3, price_cents = ?4, active = ?5 \
             WHERE id = ?1",
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price_cents)
        .bind(service.active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", &service.id));
        }

        Ok(())
    }

    /// Soft-deletes a service by setting active = false.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating service");

        let result = sqlx::query("UPDATE services SET active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }
}

/// Helper to generate a new service ID.
pub fn generate_service_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn sample(id: &str, name: &str) -> Service {
        Service {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            price_cents: 4500,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.services();

        repo.insert(&sample("s1", "Oil Change")).await.unwrap();
        repo.insert(&sample("s2", "Tire Rotation")).await.unwrap();

        repo.soft_delete("s1").await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "s2");

        // The row is still there for historical resolution.
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(!repo.get_by_id("s1").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_soft_delete_missing_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.services().soft_delete("nope").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
