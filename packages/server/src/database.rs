use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::entity::{listing, recheck_job};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .if_not_exists()
            .name("idx_listing_sku_intent_deleted_seen")
            .table(listing::Entity)
            .col(listing::Column::Sku)
            .col(listing::Column::Intent)
            .col(listing::Column::IsDeleted)
            .col(listing::Column::LastSeenAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_listing_last_checked_at")
            .table(listing::Entity)
            .col(listing::Column::LastCheckedAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_recheck_job_state_run_at")
            .table(recheck_job::Entity)
            .col(recheck_job::Column::State)
            .col(recheck_job::Column::RunAt)
            .to_owned(),
    ]
}

/// Create the composite indexes the read and claim paths rely on.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    for index in indexes() {
        db.execute_unprepared(&index.to_string(PostgresQueryBuilder))
            .await?;
    }
    info!("Indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_statements() {
        let sql: Vec<String> = indexes()
            .iter()
            .map(|i| i.to_string(PostgresQueryBuilder))
            .collect();

        assert_eq!(sql.len(), 3);
        assert!(sql.iter().all(|s| s.starts_with("CREATE INDEX IF NOT EXISTS")));
        assert!(sql[0].contains(r#""sku", "intent", "is_deleted", "last_seen_at""#));
        assert!(sql[2].contains(r#""recheck_job""#));
    }
}
