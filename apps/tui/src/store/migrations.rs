use sqlx::{
    migrate::MigrateDatabase, query, query_scalar, sqlite::SqlitePoolOptions, Sqlite, SqlitePool,
};

/// Creates the snapshot tables if they don't exist
pub async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    query(
        "CREATE TABLE IF NOT EXISTS enriched_pois (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            place_name TEXT,
            description TEXT,
            city TEXT,
            state TEXT,
            subregion TEXT,
            region TEXT,
            lat REAL,
            lng REAL,
            tags TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await?;

    query(
        "CREATE TABLE IF NOT EXISTS snapshot_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // Columns added after the first snapshot format
    ensure_column_exists(
        pool,
        "enriched_pois",
        "subregion",
        "ALTER TABLE enriched_pois ADD COLUMN subregion TEXT",
    )
    .await?;

    ensure_column_exists(
        pool,
        "enriched_pois",
        "region",
        "ALTER TABLE enriched_pois ADD COLUMN region TEXT",
    )
    .await?;

    Ok(())
}

async fn ensure_column_exists(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    alter_statement: &str,
) -> Result<(), sqlx::Error> {
    let count: i64 = query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?",
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    if count == 0 {
        tracing::info!(table, column, "adding missing snapshot column");
        query(alter_statement).execute(pool).await?;
    }

    Ok(())
}

/// `sqlite://` URL for a snapshot file path
pub fn database_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        return path.to_string();
    }

    let clean_path = path.trim_start_matches('/');
    if std::path::Path::new(path).is_absolute() {
        format!("sqlite:///{clean_path}")
    } else {
        format!("sqlite://{clean_path}")
    }
}

/// Opens (creating when asked) a snapshot database and prepares its schema
pub async fn create_database_pool(
    database_url: &str,
    create_if_missing: bool,
) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");
    if !in_memory && !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        if !create_if_missing {
            return Err(sqlx::Error::Configuration(
                format!("snapshot not found: {database_url}").into(),
            ));
        }
        tracing::info!(database_url, "creating snapshot database");
        Sqlite::create_database(database_url).await?;
    }

    // One connection keeps `sqlite::memory:` a single database.
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .after_connect(|conn, _| {
            Box::pin(async move {
                use sqlx::Executor as _;
                conn.execute("PRAGMA journal_mode = WAL;").await?;
                conn.execute("PRAGMA synchronous = NORMAL;").await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    setup_database(&pool).await?;
    Ok(pool)
}
