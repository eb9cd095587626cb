//! PostgreSQL implementation of [`AuthorizationStore`].
//!
//! The change feed is built on `LISTEN`/`NOTIFY`: a row trigger on
//! `authorizations` publishes a JSON payload on [`CHANGE_CHANNEL`] for every
//! insert and delete (see `migrations/`).

use super::{AuthorizationStore, ChangeEvent, CHANGE_FEED_CAPACITY};
use crate::errors::DcError;
use crate::observability::metrics::record_store_query;
use chrono::{DateTime, Utc};
use common::types::{Authorization, AuthorizationId, LocationSettings, Person};
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Notification channel the row trigger publishes on.
pub const CHANGE_CHANNEL: &str = "authorization_changes";

#[derive(Debug, Clone, sqlx::FromRow, Deserialize)]
struct AuthorizationRow {
    authorization_id: Uuid,
    location_id: String,
    person_name: String,
    person_phone: String,
    person_no_notify: bool,
    created_at: DateTime<Utc>,
}

impl From<AuthorizationRow> for Authorization {
    fn from(row: AuthorizationRow) -> Self {
        Authorization {
            id: AuthorizationId(row.authorization_id),
            person: Person {
                name: row.person_name,
                phone: row.person_phone,
                no_notify: row.person_no_notify,
            },
            created_at: row.created_at,
            location_id: row.location_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    location_id: String,
    allowed_people: Json<Vec<Person>>,
    notify_numbers: Vec<String>,
}

impl From<SettingsRow> for LocationSettings {
    fn from(row: SettingsRow) -> Self {
        LocationSettings {
            location_id: row.location_id,
            allowed_people: row.allowed_people.0,
            notify_numbers: row.notify_numbers,
        }
    }
}

/// Payload published by the `notify_authorization_change` trigger.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ChangePayload {
    Insert(AuthorizationRow),
    Delete { authorization_id: Uuid },
}

/// Decode a trigger payload into a change event.
pub fn decode_change(payload: &str) -> Result<ChangeEvent, DcError> {
    let decoded: ChangePayload = serde_json::from_str(payload)
        .map_err(|e| DcError::Store(format!("Malformed change notification: {e}")))?;

    Ok(match decoded {
        ChangePayload::Insert(row) => ChangeEvent::Insert(row.into()),
        ChangePayload::Delete { authorization_id } => {
            ChangeEvent::Delete(AuthorizationId(authorization_id))
        }
    })
}

/// Authorization store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgAuthorizationStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgAuthorizationStore {
    /// Wrap an existing pool. Authorizations older than `ttl` are treated as
    /// gone even before the sweeper deletes them.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Connect a new pool.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        ttl: Duration,
    ) -> Result<Self, DcError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| {
                error!(target: "dc.store", error = %e, "Failed to connect to database");
                DcError::Store(format!("Failed to connect to database: {e}"))
            })?;

        info!(target: "dc.store", max_connections, "Database pool connected");
        Ok(Self::new(pool, ttl))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), DcError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DcError::Store(format!("Migration failed: {e}")))?;
        info!(target: "dc.store", "Database migrations applied");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn status_of<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

#[async_trait::async_trait]
impl AuthorizationStore for PgAuthorizationStore {
    async fn find_pending(&self, location_id: &str) -> Result<Vec<Authorization>, DcError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, AuthorizationRow>(
            r#"
            SELECT authorization_id, location_id, person_name, person_phone,
                   person_no_notify, created_at
            FROM authorizations
            WHERE location_id = $1
              AND created_at > NOW() - make_interval(secs => $2)
            ORDER BY created_at
            "#,
        )
        .bind(location_id)
        .bind(self.ttl.as_secs_f64())
        .fetch_all(&self.pool)
        .await;

        record_store_query("find_pending", status_of(&result), start.elapsed());

        let rows = result
            .map_err(|e| DcError::Store(format!("Failed to fetch pending authorizations: {e}")))?;
        Ok(rows.into_iter().map(Authorization::from).collect())
    }

    async fn find_settings(
        &self,
        location_id: &str,
    ) -> Result<Option<LocationSettings>, DcError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT location_id, allowed_people, notify_numbers
            FROM location_settings
            WHERE location_id = $1
            "#,
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await;

        record_store_query("find_settings", status_of(&result), start.elapsed());

        let row = result
            .map_err(|e| DcError::Store(format!("Failed to fetch location settings: {e}")))?;
        Ok(row.map(LocationSettings::from))
    }

    async fn delete_many(&self, ids: &[AuthorizationId]) -> Result<u64, DcError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let start = Instant::now();
        let result = sqlx::query("DELETE FROM authorizations WHERE authorization_id = ANY($1)")
            .bind(&uuids)
            .execute(&self.pool)
            .await;

        record_store_query("delete_many", status_of(&result), start.elapsed());

        let deleted = result
            .map_err(|e| DcError::Store(format!("Failed to delete authorizations: {e}")))?
            .rows_affected();
        debug!(target: "dc.store", requested = ids.len(), deleted, "Authorizations deleted");
        Ok(deleted)
    }

    async fn watch(&self) -> Result<mpsc::Receiver<ChangeEvent>, DcError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!(target: "dc.change_feed", channel = CHANGE_CHANNEL, "Listening for authorization changes");

        let (tx, rx) = mpsc::channel(CHANGE_FEED_CAPACITY);
        tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(e) => {
                        error!(target: "dc.change_feed", error = %e, "Change feed listener failed");
                        break;
                    }
                };

                let event = match decode_change(notification.payload()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(target: "dc.change_feed", error = %e, "Skipping change notification");
                        continue;
                    }
                };

                if tx.send(event).await.is_err() {
                    debug!(target: "dc.change_feed", "Change feed receiver dropped");
                    break;
                }
            }
        });

        Ok(rx)
    }
}
