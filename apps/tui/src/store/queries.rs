use poi_core::filters::{Clause, FilterQuery};
use poi_core::{FacetRow, Poi};
use sqlx::{query, query_as, query_scalar, QueryBuilder, Sqlite, SqlitePool};

use crate::store::models::{PoiRow, SnapshotInfo};

const POI_COLUMNS: &str =
    "id, place_name, description, city, state, subregion, region, lat, lng, tags";

/// Appends `WHERE` conditions with PostgREST semantics: `eq` and `in` on a
/// column, `cs` as "the tag array contains every listed tag".
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &FilterQuery) {
    builder.push(" WHERE 1 = 1");

    for clause in filters.clauses() {
        match clause {
            Clause::Contains { values, .. } => {
                for tag in values {
                    builder
                        .push(" AND EXISTS (SELECT 1 FROM json_each(enriched_pois.tags) WHERE json_each.value = ")
                        .push_bind(tag.clone())
                        .push(")");
                }
            }
            Clause::Eq { field, value } => {
                builder
                    .push(format!(" AND {} = ", field.as_str()))
                    .push_bind(value.clone());
            }
            Clause::In { field, values } => {
                builder.push(format!(" AND {} IN (", field.as_str()));
                let mut separated = builder.separated(", ");
                for value in values {
                    separated.push_bind(value.clone());
                }
                separated.push_unseparated(")");
            }
        }
    }
}

/// Retrieves POI rows matching the filters, in export order
pub async fn get_pois(pool: &SqlitePool, filters: &FilterQuery) -> Result<Vec<PoiRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {POI_COLUMNS} FROM enriched_pois"));
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY position");

    builder.build_query_as::<PoiRow>().fetch_all(pool).await
}

/// Retrieves the facet columns of every row
pub async fn get_facet_rows(pool: &SqlitePool) -> Result<Vec<FacetRow>, sqlx::Error> {
    let rows = query_as::<_, (Option<String>, Option<String>, Option<String>, Option<String>, String)>(
        "SELECT city, state, subregion, region, tags FROM enriched_pois ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(city, state, subregion, region, tags)| FacetRow {
            city,
            state,
            subregion,
            region,
            tags: serde_json::from_str::<Option<Vec<String>>>(&tags)
                .ok()
                .flatten()
                .unwrap_or_default(),
        })
        .collect())
}

pub async fn count_pois(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    query_scalar("SELECT COUNT(*) FROM enriched_pois")
        .fetch_one(pool)
        .await
}

async fn get_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    query_scalar("SELECT value FROM snapshot_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn snapshot_info(pool: &SqlitePool) -> Result<SnapshotInfo, sqlx::Error> {
    Ok(SnapshotInfo {
        source: get_meta(pool, "source").await?,
        exported_at: get_meta(pool, "exported_at").await?,
        poi_count: count_pois(pool).await?,
    })
}

/// Replaces the whole snapshot in one transaction
pub async fn replace_snapshot(
    pool: &SqlitePool,
    pois: &[Poi],
    source: &str,
    exported_at: &str,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    query("DELETE FROM enriched_pois").execute(&mut *tx).await?;

    let mut inserted = 0;
    for (position, poi) in (0_i64..).zip(pois) {
        let id = serde_json::to_string(&poi.id).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let tags = serde_json::to_string(&poi.tags).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        query(
            "INSERT INTO enriched_pois \
             (position, id, place_name, description, city, state, subregion, region, lat, lng, tags) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(position)
        .bind(id)
        .bind(&poi.name)
        .bind(&poi.description)
        .bind(&poi.city)
        .bind(&poi.state)
        .bind(&poi.subregion)
        .bind(&poi.region)
        .bind(poi.lat)
        .bind(poi.lng)
        .bind(tags)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    for (key, value) in [("source", source), ("exported_at", exported_at)] {
        query("INSERT INTO snapshot_meta (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(inserted)
}
