//! Voucher catalog reads and the one-shot claim flow.

use jiff::Timestamp;
use jiff_sqlx::{Timestamp as SqlxTs, ToSqlx};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres};

use payloads::{TransactionKind, UserId, VoucherId};

use super::{OptionalTimestamp, StoreError, wallet};
use crate::time::TimeSource;

#[derive(Debug, Clone, FromRow)]
pub struct Voucher {
    pub id: VoucherId,
    pub code: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub active: bool,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub expires_at: Option<Timestamp>,
    pub quota: Option<i64>,
    pub per_user_limit: Option<i64>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
}

impl From<Voucher> for payloads::responses::VoucherInfo {
    fn from(voucher: Voucher) -> Self {
        Self {
            id: voucher.id,
            code: voucher.code,
            amount: voucher.amount,
            description: voucher.description,
            expires_at: voucher.expires_at,
        }
    }
}

pub async fn get_voucher_by_code(
    code: &str,
    pool: &PgPool,
) -> Result<Voucher, StoreError> {
    sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE code = $1")
        .bind(code)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::VoucherNotFound,
            e => StoreError::Database(e),
        })
}

const DEFAULT_VOUCHER_LIMIT: i64 = 50;

/// Vouchers the user can still claim: active, unexpired, under quota, and
/// not already claimed by this user.
///
/// Quota and per-user-limit are read-time filters only; a claim racing the
/// last quota slot is not prevented here.
pub async fn list_unclaimed_vouchers(
    user_id: &UserId,
    limit: Option<i64>,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<Vec<Voucher>, StoreError> {
    let limit = match limit {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_VOUCHER_LIMIT,
    };
    Ok(sqlx::query_as::<_, Voucher>(
        r#"
        SELECT v.* FROM vouchers v
        WHERE v.active = TRUE
          AND (v.expires_at IS NULL OR v.expires_at > $2)
          AND (
            v.quota IS NULL OR v.quota > (
              SELECT COUNT(*) FROM voucher_claims WHERE voucher_id = v.id
            )
          )
          AND NOT EXISTS (
            SELECT 1 FROM voucher_claims c
            WHERE c.user_id = $1 AND c.voucher_id = v.id
          )
        ORDER BY v.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(time_source.now().to_sqlx())
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Insert the claim row, relying on the `(user_id, voucher_id)` unique
/// constraint. Returns false without error when the row already exists;
/// that is the idempotency signal, not a failure.
pub(crate) async fn create_voucher_claim_tx(
    user_id: &UserId,
    voucher_id: &VoucherId,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO voucher_claims (user_id, voucher_id, claimed_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, voucher_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(voucher_id)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Claim a voucher by code, crediting the redeem sub-balance exactly once
/// per (user, voucher).
///
/// The activity checks use a single clock reading. The claim insert and the
/// balance credit share one transaction: if the unique constraint rejects
/// the claim the scope is rolled back with no balance change, and the
/// caller sees a conflict.
#[tracing::instrument(skip(pool, time_source))]
pub async fn claim(
    user_id: &UserId,
    code: &str,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<(), StoreError> {
    let voucher = get_voucher_by_code(code, pool).await?;

    let now = time_source.now();
    if !voucher.active {
        return Err(StoreError::VoucherInactive);
    }
    if let Some(expires_at) = voucher.expires_at
        && now > expires_at
    {
        return Err(StoreError::VoucherExpired);
    }

    let mut tx = pool.begin().await?;

    let inserted =
        create_voucher_claim_tx(user_id, &voucher.id, now, &mut tx).await?;
    if !inserted {
        return Err(StoreError::VoucherAlreadyClaimed);
    }

    let reference = voucher.id.to_string();
    let description = format!("Klaim voucher {code}");
    wallet::apply_balance_change_tx(
        &wallet::BalanceChange {
            user_id: *user_id,
            delta_total: voucher.amount,
            delta_topup: Decimal::ZERO,
            delta_redeem: voucher.amount,
            kind: TransactionKind::KlaimVoucher,
            amount: voucher.amount,
            description: &description,
            reference_id: Some(&reference),
        },
        now,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    Ok(())
}
