use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use tracing::{info, warn};

use crate::app::ports::{BatchLoader, LoadReceipt};
use crate::error::{EtlError, Result};
use crate::types::{CanonicalAggregate, ClassificationTaxonomy, DateParts, ResolvedLocation};

const MIGRATION_SQL: &str = include_str!("../../migrations/001_create_meteorite_schema.sql");

/// Loads a batch into the star schema inside a single libSQL transaction
pub struct LibsqlLoader {
    db: Database,
    target: String,
}

impl LibsqlLoader {
    /// `url` is either a remote libSQL/Turso url or a local database file path
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self> {
        let remote = ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));

        let built = if remote {
            info!("Connecting to remote database at {}", url);
            Builder::new_remote(url.to_string(), auth_token.unwrap_or_default())
                .build()
                .await
        } else {
            let path = url
                .trim_start_matches("sqlite://")
                .trim_start_matches("file:");
            info!("Opening local database {}", path);
            Builder::new_local(path).build().await
        };
        let db = built.map_err(|e| EtlError::Database {
            message: format!("Failed to open database: {e}"),
        })?;

        Ok(Self {
            db,
            target: url.to_string(),
        })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(MIGRATION_SQL)
            .await
            .map_err(|e| EtlError::Database {
                message: format!("Failed to run migrations: {e}"),
            })?;
        Ok(())
    }

    fn connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| EtlError::Database {
            message: format!("Failed to get database connection: {e}"),
        })
    }
}

/// Inserts one location, classification and date row per aggregate, then the
/// fact row pointing at them. Dimension rows are never shared, so two specimens
/// in the same cell, group and year get distinct fact keys.
async fn write_batch(conn: &Connection, batch: &[CanonicalAggregate]) -> libsql::Result<usize> {
    for aggregate in batch {
        let id_location = insert_location(conn, &aggregate.location).await?;
        let id_classification = insert_classification(conn, &aggregate.classification).await?;
        let id_date = insert_date(conn, &aggregate.date).await?;

        conn.execute(
            "INSERT INTO meteorite (id_location, id_classification, id_date, mass) VALUES (?, ?, ?, ?)",
            libsql::params![id_location, id_classification, id_date, aggregate.mass],
        )
        .await?;
    }
    Ok(batch.len())
}

async fn insert_location(conn: &Connection, location: &ResolvedLocation) -> libsql::Result<i64> {
    conn.execute(
        "INSERT INTO location (latitude, longitude, city, state, country) VALUES (?, ?, ?, ?, ?)",
        libsql::params![
            location.latitude,
            location.longitude,
            location.city.as_deref(),
            location.state.as_deref(),
            location.country.as_deref()
        ],
    )
    .await?;
    Ok(conn.last_insert_rowid())
}

async fn insert_classification(conn: &Connection, taxonomy: &ClassificationTaxonomy) -> libsql::Result<i64> {
    conn.execute(
        "INSERT INTO classification (classification, material_type, chemical_composition, clan, clazz) VALUES (?, ?, ?, ?, ?)",
        libsql::params![
            taxonomy.group.as_str(),
            taxonomy.material_type.as_str(),
            taxonomy.chemical_composition.as_str(),
            taxonomy.clan.as_deref(),
            taxonomy.clazz.as_deref()
        ],
    )
    .await?;
    Ok(conn.last_insert_rowid())
}

async fn insert_date(conn: &Connection, date: &DateParts) -> libsql::Result<i64> {
    let full_date = date
        .full_date()
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    conn.execute(
        "INSERT INTO \"date\" (\"date\", month, quarter, year) VALUES (?, ?, ?, ?)",
        libsql::params![
            full_date,
            i64::from(date.month),
            i64::from(date.quarter),
            i64::from(date.year)
        ],
    )
    .await?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl BatchLoader for LibsqlLoader {
    async fn commit(&self, batch: &[CanonicalAggregate]) -> std::result::Result<LoadReceipt, String> {
        self.run_migrations().await.map_err(|e| e.to_string())?;
        let conn = self.connection().map_err(|e| e.to_string())?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| format!("Failed to open transaction: {e}"))?;
        match write_batch(&tx, batch).await {
            Ok(rows) => {
                tx.commit()
                    .await
                    .map_err(|e| format!("Failed to commit batch: {e}"))?;
                info!("💾 Committed {} meteorites to {}", rows, self.target);
                Ok(LoadReceipt {
                    rows,
                    target: self.target.clone(),
                })
            }
            Err(e) => {
                warn!("Batch insert failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(format!("Failed to insert batch: {e}"))
            }
        }
    }
}
