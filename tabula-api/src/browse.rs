//! Browse execution.
//!
//! Compiles a request through [`BrowsePlanner`], runs the statement on a
//! pooled connection and maps the rows. A shutdown signal or the query
//! deadline cancels the statement server-side before the error is returned.

use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::row_mapping::{BrowseResponse, RowMapper};
use std::time::Duration;
use tabula_core::BrowseRequest;
use tabula_storage::{wait_for_shutdown, BrowsePlanner};
use tokio::sync::watch;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

enum Interruption {
    Shutdown,
    Deadline,
}

async fn interrupted(shutdown: Option<watch::Receiver<bool>>, deadline: Duration) -> Interruption {
    match shutdown {
        Some(mut rx) => {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut rx) => Interruption::Shutdown,
                _ = tokio::time::sleep(deadline) => Interruption::Deadline,
            }
        }
        None => {
            tokio::time::sleep(deadline).await;
            Interruption::Deadline
        }
    }
}

/// Executes browse requests against the read-write pool.
#[derive(Clone)]
pub struct BrowseService {
    db: DbClient,
    planner: BrowsePlanner,
    page_size: i64,
    query_timeout: Duration,
}

impl BrowseService {
    pub fn new(db: DbClient, planner: BrowsePlanner, page_size: i64, query_timeout: Duration) -> Self {
        Self {
            db,
            planner,
            page_size,
            query_timeout,
        }
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Compile, execute and map one browse page.
    pub async fn execute(
        &self,
        request: &BrowseRequest,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> ApiResult<BrowseResponse> {
        let compiled = self.planner.plan(request, self.page_size).await?;

        let conn = self.db.get_conn().await?;
        let cancel_token = conn.cancel_token();

        let params: Vec<&(dyn ToSql + Sync)> = compiled
            .binds
            .iter()
            .map(|bind| bind as &(dyn ToSql + Sync))
            .collect();

        let run = async {
            let statement = conn.prepare(&compiled.sql).await?;
            let rows = conn.query(&statement, &params).await?;
            Ok::<_, tokio_postgres::Error>((statement, rows))
        };

        let outcome = tokio::select! {
            biased;
            interruption = interrupted(shutdown, self.query_timeout) => Err(interruption),
            result = run => Ok(result),
        };

        let (statement, rows) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => {
                tracing::error!(
                    table = %request.table,
                    statement = %compiled.sql,
                    error = ?err,
                    "Browse statement failed"
                );
                return Err(err.into());
            }
            Err(interruption) => {
                if let Err(err) = cancel_token.cancel_query(NoTls).await {
                    tracing::warn!(error = ?err, "Failed to cancel browse statement");
                }
                // The session may still be draining the cancelled statement.
                drop(deadpool_postgres::Object::take(conn));
                return Err(match interruption {
                    Interruption::Shutdown => {
                        tracing::info!(table = %request.table, "Browse cancelled by shutdown");
                        ApiError::cancelled("browse")
                    }
                    Interruption::Deadline => {
                        tracing::warn!(
                            table = %request.table,
                            after = ?self.query_timeout,
                            "Browse deadline exceeded"
                        );
                        ApiError::timeout("browse")
                    }
                });
            }
        };

        let mapper = RowMapper::new(statement.columns());
        let rows = mapper.map_rows(&rows)?;
        tracing::debug!(table = %request.table, rows = rows.len(), "Browse page mapped");

        Ok(BrowseResponse {
            columns: mapper.column_names().to_vec(),
            rows,
            column_meta: compiled.column_meta,
            page_size: compiled.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_by_deadline() {
        let outcome = interrupted(None, Duration::from_secs(3)).await;
        assert!(matches!(outcome, Interruption::Deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_wins_over_deadline() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(interrupted(Some(rx), Duration::from_secs(60)));
        tx.send(true).unwrap();
        assert!(matches!(waiter.await.unwrap(), Interruption::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_still_honours_deadline() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let outcome = interrupted(Some(rx), Duration::from_secs(1)).await;
        assert!(matches!(outcome, Interruption::Deadline));
    }
}
