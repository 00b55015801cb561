//! PostgreSQL recipe store.
//!
//! Connection pooling uses deadpool-postgres. Every query here is read-only;
//! writes belong to the CRUD layer.

use crate::recipe_store::{RecipeStore, StoreResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use mealwise_core::{StoreError, StoredRecipe, UserSettings};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "mealwise".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("MEALWISE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("MEALWISE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("MEALWISE_DB_NAME").unwrap_or_else(|_| "mealwise".to_string()),
            user: std::env::var("MEALWISE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("MEALWISE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("MEALWISE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("MEALWISE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Connection {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// QUERIES
// ============================================================================

const RECIPE_COLUMNS: &str = "r.id, r.name, r.description, r.ingredients, r.steps, r.calories, \
     r.cooking_time, r.nutrition_facts, r.cuisine_type, r.diet_type, r.created_by, \
     r.created_at, r.updated_at, r.views, r.img";

fn popular_sql() -> String {
    format!(
        "SELECT {RECIPE_COLUMNS}, COUNT(f.id) AS favorite_count \
         FROM recipes r JOIN favorites f ON f.recipe_id = r.id \
         GROUP BY r.id \
         ORDER BY favorite_count DESC, r.created_at DESC \
         LIMIT $1"
    )
}

fn recent_sql() -> String {
    format!(
        "SELECT {RECIPE_COLUMNS}, \
         (SELECT COUNT(*) FROM favorites f WHERE f.recipe_id = r.id) AS favorite_count \
         FROM recipes r \
         ORDER BY r.created_at DESC \
         LIMIT $1"
    )
}

fn by_cuisine_sql() -> String {
    format!(
        "SELECT {RECIPE_COLUMNS}, \
         (SELECT COUNT(*) FROM favorites f WHERE f.recipe_id = r.id) AS favorite_count \
         FROM recipes r \
         WHERE r.cuisine_type = $1 \
         ORDER BY r.created_at DESC \
         LIMIT $2"
    )
}

const COUNT_SQL: &str = "SELECT COUNT(*) FROM recipes";

const CUISINE_COUNTS_SQL: &str = "SELECT cuisine_type, COUNT(*) FROM recipes \
     WHERE cuisine_type IS NOT NULL GROUP BY cuisine_type";

const AVERAGE_COOKING_TIME_SQL: &str =
    "SELECT COALESCE(AVG(cooking_time)::float8, 0) FROM recipes WHERE cooking_time IS NOT NULL";

const USER_SETTINGS_SQL: &str = "SELECT user_id::text, llm_service, model_name, api_key, \
     api_endpoint, COALESCE(is_paid, true) FROM settings WHERE user_id::text = $1";

// ============================================================================
// STORE
// ============================================================================

/// [`RecipeStore`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRecipeStore {
    pool: Pool,
}

impl PgRecipeStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| StoreError::Connection {
            reason: e.to_string(),
        })
    }

    async fn recipes(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> StoreResult<Vec<StoredRecipe>> {
        let conn = self.get_conn().await?;
        let rows = conn.query(sql, params).await.map_err(query_error)?;
        rows.iter().map(recipe_from_row).collect()
    }
}

fn query_error(e: tokio_postgres::Error) -> StoreError {
    StoreError::Query {
        reason: e.to_string(),
    }
}

fn decode_error(entity: &str, e: tokio_postgres::Error) -> StoreError {
    StoreError::Decode {
        entity: entity.to_string(),
        reason: e.to_string(),
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn recipe_from_row(row: &Row) -> StoreResult<StoredRecipe> {
    let err = |e| decode_error("recipe", e);
    Ok(StoredRecipe {
        id: row.try_get(0).map_err(err)?,
        name: row.try_get(1).map_err(err)?,
        description: row.try_get(2).map_err(err)?,
        ingredients: row
            .try_get::<_, Option<serde_json::Value>>(3)
            .map_err(err)?
            .unwrap_or(serde_json::Value::Null),
        steps: row
            .try_get::<_, Option<serde_json::Value>>(4)
            .map_err(err)?
            .unwrap_or(serde_json::Value::Null),
        calories: row.try_get(5).map_err(err)?,
        cooking_time: row.try_get(6).map_err(err)?,
        nutrition_facts: row
            .try_get::<_, Option<serde_json::Value>>(7)
            .map_err(err)?
            .unwrap_or(serde_json::Value::Null),
        cuisine_type: row.try_get(8).map_err(err)?,
        diet_type: row
            .try_get::<_, Option<Vec<String>>>(9)
            .map_err(err)?
            .unwrap_or_default(),
        created_by: row.try_get(10).map_err(err)?,
        created_at: row.try_get(11).map_err(err)?,
        updated_at: row.try_get(12).map_err(err)?,
        views: row
            .try_get::<_, Option<i32>>(13)
            .map_err(err)?
            .unwrap_or(0),
        img: row.try_get(14).map_err(err)?,
        favorite_count: row.try_get(15).map_err(err)?,
    })
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn popular_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.recipes(&popular_sql(), &[&sql_limit(limit)]).await
    }

    async fn recent_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.recipes(&recent_sql(), &[&sql_limit(limit)]).await
    }

    async fn recipes_by_cuisine(
        &self,
        cuisine: &str,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecipe>> {
        self.recipes(&by_cuisine_sql(), &[&cuisine, &sql_limit(limit)])
            .await
    }

    async fn recipe_count(&self) -> StoreResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one(COUNT_SQL, &[]).await.map_err(query_error)?;
        row.try_get(0).map_err(|e| decode_error("recipe count", e))
    }

    async fn cuisine_counts(&self) -> StoreResult<BTreeMap<String, i64>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(CUISINE_COUNTS_SQL, &[])
            .await
            .map_err(query_error)?;
        rows.iter()
            .map(|row| {
                let err = |e| decode_error("cuisine count", e);
                Ok((row.try_get(0).map_err(err)?, row.try_get(1).map_err(err)?))
            })
            .collect()
    }

    async fn average_cooking_time(&self) -> StoreResult<f64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(AVERAGE_COOKING_TIME_SQL, &[])
            .await
            .map_err(query_error)?;
        row.try_get(0)
            .map_err(|e| decode_error("average cooking time", e))
    }

    async fn user_settings(&self, user_id: &str) -> StoreResult<Option<UserSettings>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(USER_SETTINGS_SQL, &[&user_id])
            .await
            .map_err(query_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let err = |e| decode_error("settings", e);
        Ok(Some(UserSettings {
            user_id: row.try_get(0).map_err(err)?,
            llm_service: row.try_get(1).map_err(err)?,
            model_name: row.try_get(2).map_err(err)?,
            api_key: row.try_get(3).map_err(err)?,
            api_endpoint: row.try_get(4).map_err(err)?,
            is_paid: row.try_get(5).map_err(err)?,
        }))
    }
}

impl std::fmt::Debug for PgRecipeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRecipeStore")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "mealwise");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_db_config_debug_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_sql_limit_saturates() {
        assert_eq!(sql_limit(50), 50);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_queries_are_read_only() {
        for sql in [
            popular_sql(),
            recent_sql(),
            by_cuisine_sql(),
            COUNT_SQL.to_string(),
            CUISINE_COUNTS_SQL.to_string(),
            AVERAGE_COOKING_TIME_SQL.to_string(),
            USER_SETTINGS_SQL.to_string(),
        ] {
            let upper = sql.to_uppercase();
            assert!(upper.trim_start().starts_with("SELECT"), "{}", sql);
            for verb in ["INSERT", "UPDATE ", "DELETE", "DROP"] {
                assert!(!upper.contains(verb), "{} contains {}", sql, verb);
            }
        }
    }

    #[test]
    fn test_popular_query_orders_by_favorites() {
        let sql = popular_sql();
        assert!(sql.contains("ORDER BY favorite_count DESC"));
        assert!(sql.contains("LIMIT $1"));
    }

    #[test]
    fn test_create_pool_does_not_connect() {
        let pool = DbConfig::default().create_pool().unwrap();
        assert_eq!(pool.status().size, 0);
    }
}
