//! PostgreSQL implementation of [`PoolStore`].
//!
//! Schema lives in `migrations/`. Multi-row writes run inside a single
//! transaction; a dropped transaction rolls back.
//!
//! Participant writes hold a `FOR SHARE` lock on the owning pool row, which
//! conflicts with the row lock taken by [`PoolStore::commit_match`]. A match
//! commit therefore sees every roster change that committed before it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{MatchCommit, PoolStore, StoreCounts, StoreError, same_roster};
use crate::domain::{
    FieldType, MatchPair, MatchRecord, MatchRecordId, MatchStatus, PairMember, Participant,
    ParticipantId, Pool, PoolField, PoolId, ProfileData, StoredStatus,
};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

type PoolRow = (
    Uuid,
    String,
    String,
    DateTime<Utc>,
    i64,
    String,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);
type FieldRow = (Uuid, String, String, String, bool, i32);
type ParticipantRow = (Uuid, Uuid, Json<ProfileData>, Option<String>, DateTime<Utc>);
type RecordRow = (Uuid, Uuid, String, i32, i32, bool, String, DateTime<Utc>);
type PairRow = (i32, Uuid, Json<ProfileData>, Option<Uuid>, Option<Json<ProfileData>>);

const POOL_COLUMNS: &str =
    "id, name, description, valid_until, cooldown_secs, status, last_matched_at, created_at";
const RECORD_COLUMNS: &str =
    "id, pool_id, pool_name, participant_count, pair_count, has_lone, status, matched_at";

/// [`PoolStore`] backed by `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn load_fields(
        &self,
        pool_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<PoolField>>, StoreError> {
        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT pool_id, name, label, field_type, required, field_order FROM pool_fields \
             WHERE pool_id = ANY($1) ORDER BY pool_id, field_order, position",
        )
        .bind(pool_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut fields: HashMap<Uuid, Vec<PoolField>> = HashMap::new();
        for (pool_id, name, label, field_type, required, order) in rows {
            fields.entry(pool_id).or_default().push(PoolField {
                name,
                label,
                field_type: FieldType::parse(&field_type),
                required,
                order,
            });
        }
        Ok(fields)
    }

    async fn insert_pairs(
        tx: &mut Transaction<'_, Postgres>,
        record_id: Uuid,
        pairs: &[MatchPair],
    ) -> Result<(), StoreError> {
        for pair in pairs {
            sqlx::query(
                "INSERT INTO match_pairs \
                 (record_id, pair_number, first_participant_id, first_data, \
                 second_participant_id, second_data) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(record_id)
            .bind(to_i32(pair.pair_number))
            .bind(*pair.first.participant_id.as_uuid())
            .bind(Json(&pair.first.data))
            .bind(pair.second.as_ref().map(|m| *m.participant_id.as_uuid()))
            .bind(pair.second.as_ref().map(|m| Json(&m.data)))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn lock_pool_shared(
        tx: &mut Transaction<'_, Postgres>,
        pool_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT 1 FROM pools WHERE id = $1 FOR SHARE")
            .bind(pool_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn to_u32(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}

fn to_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn pool_from_row(row: PoolRow, fields: Vec<PoolField>) -> Pool {
    let (id, name, description, valid_until, cooldown_secs, status, last_matched_at, created_at) =
        row;
    Pool {
        id: PoolId::from_uuid(id),
        name,
        description,
        valid_until,
        cooldown_secs: u32::try_from(cooldown_secs).unwrap_or(0),
        status: StoredStatus::parse(&status),
        last_matched_at,
        created_at,
        fields,
    }
}

fn participant_from_row(row: ParticipantRow) -> Participant {
    let (id, pool_id, Json(data), contact, joined_at) = row;
    Participant {
        id: ParticipantId::from_uuid(id),
        pool_id: PoolId::from_uuid(pool_id),
        data,
        contact,
        joined_at,
    }
}

fn record_from_row(row: RecordRow, pairs: Vec<MatchPair>) -> MatchRecord {
    let (id, pool_id, pool_name, participant_count, pair_count, has_lone, status, matched_at) = row;
    MatchRecord {
        id: MatchRecordId::from_uuid(id),
        pool_id: PoolId::from_uuid(pool_id),
        pool_name,
        participant_count: to_u32(participant_count),
        pair_count: to_u32(pair_count),
        has_lone,
        status: MatchStatus::parse(&status),
        matched_at,
        pairs,
    }
}

fn pair_from_row(row: PairRow) -> MatchPair {
    let (pair_number, first_id, Json(first_data), second_id, second_data) = row;
    MatchPair {
        pair_number: to_u32(pair_number),
        first: PairMember {
            participant_id: ParticipantId::from_uuid(first_id),
            data: first_data,
        },
        second: second_id.map(|id| PairMember {
            participant_id: ParticipantId::from_uuid(id),
            data: second_data.map(|Json(d)| d).unwrap_or_default(),
        }),
    }
}

/// Escapes `%`, `_` and `\` so `fragment` matches literally inside `LIKE`.
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl PoolStore for PostgresStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO pools \
             (id, name, description, valid_until, cooldown_secs, status, \
             last_matched_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*pool.id.as_uuid())
        .bind(&pool.name)
        .bind(&pool.description)
        .bind(pool.valid_until)
        .bind(i64::from(pool.cooldown_secs))
        .bind(pool.status.as_str())
        .bind(pool.last_matched_at)
        .bind(pool.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, field) in pool.fields.iter().enumerate() {
            sqlx::query(
                "INSERT INTO pool_fields \
                 (pool_id, position, name, label, field_type, required, field_order) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(*pool.id.as_uuid())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(&field.name)
            .bind(&field.label)
            .bind(field.field_type.as_str())
            .bind(field.required)
            .bind(field.order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>, StoreError> {
        let row = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {POOL_COLUMNS} FROM pools WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut fields = self.load_fields(&[row.0]).await?;
        let fields = fields.remove(&row.0).unwrap_or_default();
        Ok(Some(pool_from_row(row, fields)))
    }

    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        let rows = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {POOL_COLUMNS} FROM pools ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        let mut fields = self.load_fields(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let schema = fields.remove(&row.0).unwrap_or_default();
                pool_from_row(row, schema)
            })
            .collect())
    }

    async fn delete_pool(&self, id: PoolId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pools WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_participants(&self, pool_id: PoolId) -> Result<u64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM participants WHERE pool_id = $1")
                .bind(*pool_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(to_u64(count))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pool_shared(&mut tx, *participant.pool_id.as_uuid()).await?;
        sqlx::query(
            "INSERT INTO participants (id, pool_id, data, contact, joined_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*participant.id.as_uuid())
        .bind(*participant.pool_id.as_uuid())
        .bind(Json(&participant.data))
        .bind(participant.contact.as_deref())
        .bind(participant.joined_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, pool_id, data, contact, joined_at FROM participants WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(participant_from_row))
    }

    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, pool_id, data, contact, joined_at FROM participants \
             WHERE pool_id = $1 ORDER BY joined_at ASC, id ASC",
        )
        .bind(*pool_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(participant_from_row).collect())
    }

    async fn search_participants(&self, fragment: &str) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, pool_id, data, contact, joined_at FROM participants \
             WHERE contact LIKE $1 ESCAPE '\\' ORDER BY joined_at ASC",
        )
        .bind(like_pattern(fragment))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(participant_from_row).collect())
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let owner =
            sqlx::query_scalar::<_, Uuid>("SELECT pool_id FROM participants WHERE id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(pool_id) = owner else {
            return Ok(false);
        };
        Self::lock_pool_shared(&mut tx, pool_id).await?;
        let result = sqlx::query("DELETE FROM participants WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset_status(
        &self,
        pool_id: PoolId,
        expected_last_matched_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE pools SET status = 'active' \
             WHERE id = $1 AND status = 'matched' AND last_matched_at IS NOT DISTINCT FROM $2",
        )
        .bind(*pool_id.as_uuid())
        .bind(expected_last_matched_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit_match(&self, commit: &MatchCommit) -> Result<(), StoreError> {
        let record = &commit.record;
        let mut tx = self.pool.begin().await?;

        // Row lock taken here serialises concurrent commits for one pool.
        let updated = sqlx::query(
            "UPDATE pools SET status = 'matched', last_matched_at = $2 \
             WHERE id = $1 AND last_matched_at IS NOT DISTINCT FROM $3",
        )
        .bind(*record.pool_id.as_uuid())
        .bind(record.matched_at)
        .bind(commit.expected_last_matched_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!(
                "pool {} changed while matching",
                record.pool_id
            )));
        }

        let mut current: Vec<ParticipantId> =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM participants WHERE pool_id = $1")
                .bind(*record.pool_id.as_uuid())
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(ParticipantId::from_uuid)
                .collect();
        if !same_roster(&mut current, &commit.roster) {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!(
                "participants of pool {} changed while matching",
                record.pool_id
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO match_records ({RECORD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(*record.id.as_uuid())
        .bind(*record.pool_id.as_uuid())
        .bind(&record.pool_name)
        .bind(to_i32(record.participant_count))
        .bind(to_i32(record.pair_count))
        .bind(record.has_lone)
        .bind(record.status.as_str())
        .bind(record.matched_at)
        .execute(&mut *tx)
        .await?;

        Self::insert_pairs(&mut tx, *record.id.as_uuid(), &record.pairs).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_match_records(&self) -> Result<Vec<MatchRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM match_records ORDER BY matched_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| record_from_row(row, Vec::new()))
            .collect())
    }

    async fn get_match_record(&self, id: MatchRecordId) -> Result<Option<MatchRecord>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM match_records WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let pairs = sqlx::query_as::<_, PairRow>(
            "SELECT pair_number, first_participant_id, first_data, \
             second_participant_id, second_data \
             FROM match_pairs WHERE record_id = $1 ORDER BY pair_number ASC",
        )
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(record_from_row(
            row,
            pairs.into_iter().map(pair_from_row).collect(),
        )))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let (pools, participants, matches, pairs) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT \
             (SELECT COUNT(*) FROM pools), \
             (SELECT COUNT(*) FROM participants), \
             (SELECT COUNT(*) FROM match_records), \
             (SELECT COALESCE(SUM(pair_count), 0)::BIGINT FROM match_records)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            pools: to_u64(pools),
            participants: to_u64(participants),
            matches: to_u64(matches),
            pairs: to_u64(pairs),
        })
    }
}
