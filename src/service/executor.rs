//! Routine execution against one connection.

use crate::catalog::{ReturnShape, Routine};
use crate::sql::CommandParameter;
use sqlx::postgres::PgRow;
use sqlx::PgConnection;

#[derive(Debug)]
pub enum Outcome {
    /// Void routine completed.
    Executed,
    Rows(Vec<PgRow>),
}

pub struct RoutineExecutor;

impl RoutineExecutor {
    /// Bind parameters positionally and run the call expression.
    /// Statements are not cached: the same SQL may be bound with different native types.
    pub async fn execute(
        conn: &mut PgConnection,
        routine: &Routine,
        params: &[CommandParameter],
    ) -> Result<Outcome, sqlx::Error> {
        let sql = routine.call_expression.as_str();
        tracing::debug!(sql = %sql, params = ?params.iter().map(|p| &p.value).collect::<Vec<_>>(), "call");
        let mut query = sqlx::query(sql).persistent(false);
        for p in params {
            query = query.bind(p.value.clone());
        }
        if routine.shape == ReturnShape::Void {
            query.execute(&mut *conn).await?;
            return Ok(Outcome::Executed);
        }
        let rows = query.fetch_all(&mut *conn).await?;
        Ok(Outcome::Rows(rows))
    }
}
