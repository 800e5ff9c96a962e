//! Read routine metadata from the database.

use crate::catalog::{Routine, RoutineRow, ROUTINES_QUERY};
use crate::config::RoutineOptions;
use crate::error::ConfigError;
use sqlx::PgConnection;

fn list_filter(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

/// Load every routine passing the schema and name filters, in catalog order.
pub async fn load_routines(conn: &mut PgConnection, options: &RoutineOptions) -> Result<Vec<Routine>, ConfigError> {
    let sql = options.custom_routine_query.as_deref().unwrap_or(ROUTINES_QUERY);
    let rows = sqlx::query_as::<_, RoutineRow>(sql)
        .bind(list_filter(&options.include_schemas))
        .bind(list_filter(&options.exclude_schemas))
        .bind(options.schema_similar_to.as_deref())
        .bind(options.schema_not_similar_to.as_deref())
        .bind(list_filter(&options.include_names))
        .bind(list_filter(&options.exclude_names))
        .bind(options.name_similar_to.as_deref())
        .bind(options.name_not_similar_to.as_deref())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConfigError::Catalog(e.to_string()))?;
    let routines: Vec<Routine> = rows.into_iter().map(Routine::from).collect();
    tracing::debug!(count = routines.len(), custom_query = options.custom_routine_query.is_some(), "routines loaded");
    Ok(routines)
}
