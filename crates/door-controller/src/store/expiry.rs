//! Authorization expiry.
//!
//! PostgreSQL has no row TTL, so a background task deletes authorizations
//! older than the configured TTL. The deletes go through the same row trigger
//! as any other delete and reach the change feed, which is how the service
//! learns an authorization expired unused.

use crate::errors::DcError;
use crate::observability::metrics::{record_authorizations_expired, record_store_query};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Delete every authorization older than `ttl`. Returns the number removed.
pub async fn sweep_expired(pool: &PgPool, ttl: Duration) -> Result<u64, DcError> {
    let start = Instant::now();
    let result = sqlx::query(
        r#"
        DELETE FROM authorizations
        WHERE created_at <= NOW() - make_interval(secs => $1)
        "#,
    )
    .bind(ttl.as_secs_f64())
    .execute(pool)
    .await;

    let status = if result.is_ok() { "success" } else { "error" };
    record_store_query("expire", status, start.elapsed());

    let expired = result
        .map_err(|e| DcError::Store(format!("Failed to expire authorizations: {e}")))?
        .rows_affected();
    if expired > 0 {
        record_authorizations_expired(expired);
    }
    Ok(expired)
}

/// Spawn the expiry sweeper. It runs every `interval` until cancelled.
pub fn spawn_expiry_sweeper(
    pool: PgPool,
    ttl: Duration,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            target: "dc.store",
            ttl_seconds = ttl.as_secs(),
            interval_seconds = interval.as_secs(),
            "Starting expiry sweeper"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    info!(target: "dc.store", "Expiry sweeper received shutdown signal, exiting");
                    break;
                }
                _ = ticker.tick() => {
                    match sweep_expired(&pool, ttl).await {
                        Ok(0) => {}
                        Ok(expired) => {
                            debug!(target: "dc.store", expired, "Expired authorizations removed");
                        }
                        Err(e) => {
                            error!(target: "dc.store", error = %e, "Expiry sweep failed");
                        }
                    }
                }
            }
        }

        info!(target: "dc.store", "Expiry sweeper stopped");
    })
}
