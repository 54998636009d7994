//! Balance reads, the atomic delta upsert, the append-only transaction
//! history, and the locked withdrawal flow.
//!
//! The cached summary row maintains `total_balance == topup_balance +
//! redeem_balance` by construction: every mutation goes through
//! [`apply_balance_change_tx`], which applies consistent deltas to all
//! three columns in a single statement and appends exactly one history row
//! in the same transaction.

use jiff::Timestamp;
use jiff_sqlx::{Timestamp as SqlxTs, ToSqlx};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{FromRow, PgPool, Postgres};

use payloads::{
    BalanceKind, TransactionId, TransactionKind, UserId, requests,
};

use super::{StoreError, payment};
use crate::time::TimeSource;

#[derive(Debug, Clone, FromRow)]
pub struct WalletSummary {
    pub user_id: UserId,
    pub total_balance: Decimal,
    pub topup_balance: Decimal,
    pub redeem_balance: Decimal,
    pub loyalty_points: i32,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
}

impl From<Transaction> for payloads::responses::TransactionEntry {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.id,
            kind: txn.kind,
            amount: txn.amount,
            description: txn.description,
            reference_id: txn.reference_id,
            created_at: txn.created_at,
        }
    }
}

pub async fn get_balance(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<WalletSummary, StoreError> {
    sqlx::query_as::<_, WalletSummary>(
        "SELECT * FROM wallet_summary WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::WalletNotFound,
        e => StoreError::Database(e),
    })
}

/// Read the summary row and lock it for update.
///
/// Locks the row using SELECT FOR UPDATE, serializing concurrent mutators
/// of the same user until the transaction commits. Must be called inside a
/// transaction, before any check that gates a mutation.
pub async fn get_balance_for_update_tx(
    user_id: &UserId,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<WalletSummary, StoreError> {
    sqlx::query_as::<_, WalletSummary>(
        "SELECT * FROM wallet_summary WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::WalletNotFound)
}

/// Apply signed deltas to the summary row as a single atomic statement.
///
/// Inserts the row with the deltas as initial values if the user has no
/// wallet yet, otherwise adds them to the existing values. There is no
/// read-then-write window, so concurrent credits cannot lose updates even
/// without the row lock.
pub(crate) async fn add_balance_tx(
    user_id: &UserId,
    delta_total: Decimal,
    delta_topup: Decimal,
    delta_redeem: Decimal,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO wallet_summary (
            user_id, total_balance, topup_balance, redeem_balance,
            loyalty_points, updated_at
        )
        VALUES ($1, $2, $3, $4, 0, $5)
        ON CONFLICT (user_id) DO UPDATE
        SET total_balance  = wallet_summary.total_balance  + EXCLUDED.total_balance,
            topup_balance  = wallet_summary.topup_balance  + EXCLUDED.topup_balance,
            redeem_balance = wallet_summary.redeem_balance + EXCLUDED.redeem_balance,
            updated_at     = EXCLUDED.updated_at
        "#,
    )
    .bind(user_id)
    .bind(delta_total)
    .bind(delta_topup)
    .bind(delta_redeem)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn append_transaction_tx(
    user_id: &UserId,
    kind: TransactionKind,
    amount: Decimal,
    description: &str,
    reference_id: Option<&str>,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            user_id, kind, amount, description, reference_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .bind(description)
    .bind(reference_id)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// One balance-affecting event: signed deltas for the summary row plus the
/// history entry describing it.
#[derive(Debug)]
pub struct BalanceChange<'a> {
    pub user_id: UserId,
    pub delta_total: Decimal,
    pub delta_topup: Decimal,
    pub delta_redeem: Decimal,
    pub kind: TransactionKind,
    /// Unsigned magnitude recorded in the history row.
    pub amount: Decimal,
    pub description: &'a str,
    pub reference_id: Option<&'a str>,
}

/// Apply a balance change and append its history row as one unit.
///
/// Both statements join the caller's transaction, so either both are
/// committed or neither is. Callers that need a funds pre-check must hold
/// [`get_balance_for_update_tx`] in the same scope before calling this;
/// otherwise a concurrent withdrawal could debit between the check and the
/// mutation.
pub async fn apply_balance_change_tx(
    change: &BalanceChange<'_>,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    add_balance_tx(
        &change.user_id,
        change.delta_total,
        change.delta_topup,
        change.delta_redeem,
        now,
        tx,
    )
    .await?;

    append_transaction_tx(
        &change.user_id,
        change.kind,
        change.amount,
        change.description,
        change.reference_id,
        now,
        tx,
    )
    .await?;

    Ok(())
}

const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Most recent transactions first.
pub async fn list_transactions(
    user_id: &UserId,
    limit: Option<i64>,
    pool: &PgPool,
) -> Result<Vec<Transaction>, StoreError> {
    let limit = match limit {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_HISTORY_LIMIT,
    };
    Ok(sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Debit a sub-balance under a row lock and create the matching payout
/// request, all in one transaction.
///
/// The funds check happens after the FOR UPDATE read, so a concurrent
/// withdrawal or credit for the same user is serialized behind this scope.
/// The payout request is created inside the same scope as the debit; a
/// crash can therefore never leave a PENDING payout without its debit. The
/// disbursement call to the payout gateway is the caller's responsibility
/// and happens strictly after commit.
#[tracing::instrument(skip(details, pool, time_source), fields(user_id = %details.user_id))]
pub async fn withdraw(
    details: &requests::Withdraw,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<payment::PayoutRequest, StoreError> {
    let Some(kind) = BalanceKind::from_synonym(&details.balance_type) else {
        return Err(StoreError::UnknownBalanceKind);
    };
    if details.amount <= Decimal::ZERO {
        return Err(StoreError::AmountMustBePositive);
    }
    if details.bank_code.trim().is_empty()
        || details.account_number.trim().is_empty()
        || details.account_holder_name.trim().is_empty()
    {
        return Err(StoreError::MissingBankDetails);
    }

    let amount = details.amount;
    let now = time_source.now();

    let mut tx = pool.begin().await?;

    let summary = get_balance_for_update_tx(&details.user_id, &mut tx).await?;

    let targeted = match kind {
        BalanceKind::Topup => summary.topup_balance,
        BalanceKind::Redeem => summary.redeem_balance,
    };
    if targeted < amount || summary.total_balance < amount {
        return Err(StoreError::InsufficientBalance);
    }

    let (delta_topup, delta_redeem, txn_kind, txn_desc) = match kind {
        BalanceKind::Topup => (
            -amount,
            Decimal::ZERO,
            TransactionKind::TarikSaldoPendapatan,
            "Tarik saldo top up",
        ),
        BalanceKind::Redeem => (
            Decimal::ZERO,
            -amount,
            TransactionKind::TarikSaldoRefund,
            "Tarik saldo redeem",
        ),
    };

    let bank_details = json!({
        "bank_code": details.bank_code,
        "bank_name": details.bank_name,
        "account_number": details.account_number,
        "account_holder_name": details.account_holder_name,
        "notes": details.notes,
    });
    let payout = payment::create_payout_request_tx(
        &payment::NewPayoutRequest {
            user_id: details.user_id,
            amount,
            bank_code: &details.bank_code,
            bank_name: details.bank_name.as_deref(),
            account_number: &details.account_number,
            account_holder_name: &details.account_holder_name,
            raw_response: bank_details,
            requested_at: now,
        },
        &mut tx,
    )
    .await?;

    apply_balance_change_tx(
        &BalanceChange {
            user_id: details.user_id,
            delta_total: -amount,
            delta_topup,
            delta_redeem,
            kind: txn_kind,
            amount,
            description: txn_desc,
            reference_id: None,
        },
        now,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    Ok(payout)
}
