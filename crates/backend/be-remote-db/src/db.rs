use bon::bon;
use ota_core::{BundleRecord, Platform};
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::BundleRow,
};

const BUNDLE_COLUMNS: &str = "id, app_version, platform, deployment_key, content_hash, label, \
     storage_ref, size, is_mandatory, update_app_version, created_at";

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(50)
            .min_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        Ok(())
    }

    /// Insert a bundle record. Records are never updated afterwards.
    pub async fn insert_bundle(&self, record: &BundleRecord) -> DbResult<()> {
        let size = i64::try_from(record.size)
            .map_err(|_| DbError::SizeOutOfRange(record.size))?;

        sqlx::query(
            r#"
            INSERT INTO bundles (id, app_version, platform, deployment_key, content_hash, label,
                                 storage_ref, size, is_mandatory, update_app_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.app_version)
        .bind(record.platform.as_str())
        .bind(&record.deployment_key)
        .bind(record.content_hash.as_str())
        .bind(&record.label)
        .bind(&record.storage_ref)
        .bind(size)
        .bind(record.is_mandatory)
        .bind(record.update_app_version)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted bundle {} for {}", record.id, record.key());
        Ok(())
    }

    /// Most recently created bundle matching all three fields exactly.
    #[builder]
    pub async fn latest_bundle(
        &self,
        app_version: &str,
        platform: Platform,
        deployment_key: &str,
    ) -> DbResult<Option<BundleRecord>> {
        let query = format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundles \
             WHERE app_version = $1 AND platform = $2 AND deployment_key = $3 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );

        let row = sqlx::query_as::<_, BundleRow>(&query)
            .bind(app_version)
            .bind(platform.as_str())
            .bind(deployment_key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(BundleRecord::try_from).transpose()
    }

    pub async fn get_bundle(&self, id: Uuid) -> DbResult<BundleRecord> {
        let query = format!("SELECT {BUNDLE_COLUMNS} FROM bundles WHERE id = $1");

        let row = sqlx::query_as::<_, BundleRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::BundleNotFound(id))?;

        BundleRecord::try_from(row)
    }
}
