//! Test utilities for database operations.
//!
//! Provides helpers for setting up and tearing down a live test database.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Tables truncated between tests, children first.
const TABLES: [&str; 4] = ["comments", "followers", "posts", "users"];

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "social_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "social_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "social_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL, preferring `TEST_DATABASE_URL` when set.
    #[must_use]
    pub fn database_url(&self) -> String {
        std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            )
        })
    }
}

/// A migrated test database connection.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the test database and bring its schema up to date.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with a custom configuration.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self { conn, config })
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Take ownership of the connection, e.g. to share it behind an `Arc`.
    #[must_use]
    pub fn into_connection(self) -> DatabaseConnection {
        self.conn
    }

    /// Remove all rows and restart id sequences.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let truncate = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", TABLES.join(", "));
        self.conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, truncate))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }
}
