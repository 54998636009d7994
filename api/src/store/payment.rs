//! Payment orders (inbound top-ups), payout requests (outbound
//! withdrawals), and the settlement state machine that reconciles orders
//! against gateway notifications.
//!
//! Order status is TEXT rather than a database enum: the gateway can
//! report statuses outside the known set, and those are stored upper-cased
//! as-is. `balance_applied` is the idempotency guard — re-delivery of a
//! settled notification must be a silent no-op.

use jiff::Timestamp;
use jiff_sqlx::{Timestamp as SqlxTs, ToSqlx};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres};

use payloads::{
    PaymentOrderId, PayoutRequestId, TransactionKind, UserId,
    requests::GatewayNotification,
};

use super::{OptionalTimestamp, StoreError, wallet};
use crate::time::TimeSource;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SETTLEMENT: &str = "SETTLEMENT";
pub const STATUS_CANCELLED: &str = "CANCELLED";
pub const STATUS_EXPIRED: &str = "EXPIRED";
pub const STATUS_DENY: &str = "DENY";

#[derive(Debug, Clone, FromRow)]
pub struct PaymentOrder {
    pub id: PaymentOrderId,
    pub user_id: UserId,
    pub order_id: String,
    pub gross_amount: Decimal,
    pub snap_token: String,
    pub redirect_url: String,
    pub status: String,
    pub gateway_transaction_id: Option<String>,
    pub raw_notification: Option<serde_json::Value>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub settled_at: Option<Timestamp>,
    pub balance_applied: bool,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl From<PayoutRequest> for payloads::responses::PayoutStatus {
    fn from(payout: PayoutRequest) -> Self {
        Self {
            id: payout.id,
            amount: payout.amount,
            status: payout.status,
            gateway_payout_id: payout.gateway_payout_id,
            requested_at: payout.requested_at,
            completed_at: payout.completed_at,
        }
    }
}

impl From<PaymentOrder> for payloads::responses::PaymentStatus {
    fn from(order: PaymentOrder) -> Self {
        Self {
            id: order.id,
            order_id: order.order_id,
            status: order.status,
            amount: order.gross_amount,
            snap_token: order.snap_token,
            redirect_url: order.redirect_url,
            settled_at: order.settled_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PayoutRequest {
    pub id: PayoutRequestId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub account_number: String,
    pub account_holder_name: String,
    pub status: String,
    pub gateway_payout_id: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    #[sqlx(try_from = "SqlxTs")]
    pub requested_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub completed_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

pub struct NewPaymentOrder<'a> {
    pub user_id: UserId,
    pub order_id: &'a str,
    pub gross_amount: Decimal,
    pub snap_token: &'a str,
    pub redirect_url: &'a str,
}

pub async fn create_payment_order(
    details: &NewPaymentOrder<'_>,
    pool: &PgPool,
) -> Result<PaymentOrder, StoreError> {
    Ok(sqlx::query_as::<_, PaymentOrder>(
        r#"
        INSERT INTO payment_orders (
            user_id, order_id, gross_amount, snap_token, redirect_url
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(details.user_id)
    .bind(details.order_id)
    .bind(details.gross_amount)
    .bind(details.snap_token)
    .bind(details.redirect_url)
    .fetch_one(pool)
    .await?)
}

/// Look up an order by its externally-visible order id.
pub async fn get_payment_order(
    order_id: &str,
    pool: &PgPool,
) -> Result<PaymentOrder, StoreError> {
    sqlx::query_as::<_, PaymentOrder>(
        "SELECT * FROM payment_orders WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::PaymentOrderNotFound,
        e => StoreError::Database(e),
    })
}

/// Partial update: unset fields retain their prior values.
#[derive(Debug, Default)]
pub struct PaymentOrderUpdate {
    pub status: String,
    pub gateway_transaction_id: Option<String>,
    pub raw_notification: Option<serde_json::Value>,
    pub settled_at: Option<Timestamp>,
    pub balance_applied: Option<bool>,
}

pub async fn update_payment_order(
    order_id: &str,
    update: &PaymentOrderUpdate,
    now: Timestamp,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE payment_orders
        SET status = $2,
            gateway_transaction_id = COALESCE($3, gateway_transaction_id),
            raw_notification = COALESCE($4, raw_notification),
            settled_at = COALESCE($5, settled_at),
            balance_applied = COALESCE($6, balance_applied),
            updated_at = $7
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .bind(&update.status)
    .bind(&update.gateway_transaction_id)
    .bind(&update.raw_notification)
    .bind(update.settled_at.map(|t| t.to_sqlx()))
    .bind(update.balance_applied)
    .bind(now.to_sqlx())
    .execute(pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(StoreError::PaymentOrderNotFound);
    }
    Ok(())
}

pub struct NewPayoutRequest<'a> {
    pub user_id: UserId,
    pub amount: Decimal,
    pub bank_code: &'a str,
    pub bank_name: Option<&'a str>,
    pub account_number: &'a str,
    pub account_holder_name: &'a str,
    pub raw_response: serde_json::Value,
    pub requested_at: Timestamp,
}

pub(crate) async fn create_payout_request_tx(
    details: &NewPayoutRequest<'_>,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<PayoutRequest, StoreError> {
    Ok(sqlx::query_as::<_, PayoutRequest>(
        r#"
        INSERT INTO payout_requests (
            user_id, amount, bank_code, bank_name, account_number,
            account_holder_name, status, raw_response, requested_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(details.user_id)
    .bind(details.amount)
    .bind(details.bank_code)
    .bind(details.bank_name)
    .bind(details.account_number)
    .bind(details.account_holder_name)
    .bind(STATUS_PENDING)
    .bind(&details.raw_response)
    .bind(details.requested_at.to_sqlx())
    .fetch_one(&mut **tx)
    .await?)
}

pub async fn get_payout_request(
    id: &PayoutRequestId,
    pool: &PgPool,
) -> Result<PayoutRequest, StoreError> {
    sqlx::query_as::<_, PayoutRequest>(
        "SELECT * FROM payout_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::PayoutRequestNotFound,
        e => StoreError::Database(e),
    })
}

/// Partial update: unset fields retain their prior values.
#[derive(Debug, Default)]
pub struct PayoutRequestUpdate {
    pub status: String,
    pub gateway_payout_id: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    pub completed_at: Option<Timestamp>,
}

pub async fn update_payout_request(
    id: &PayoutRequestId,
    update: &PayoutRequestUpdate,
    now: Timestamp,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE payout_requests
        SET status = $2,
            gateway_payout_id = COALESCE($3, gateway_payout_id),
            raw_response = COALESCE($4, raw_response),
            completed_at = COALESCE($5, completed_at),
            updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&update.status)
    .bind(&update.gateway_payout_id)
    .bind(&update.raw_response)
    .bind(update.completed_at.map(|t| t.to_sqlx()))
    .bind(now.to_sqlx())
    .execute(pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(StoreError::PayoutRequestNotFound);
    }
    Ok(())
}

/// Map the gateway's (transaction_status, fraud_status) pair to the
/// internal order status, and whether the status settles the order.
///
/// Unknown statuses are stored upper-cased as-is and never apply balance.
pub fn map_notification_status(
    transaction_status: &str,
    fraud_status: &str,
) -> (String, bool) {
    match transaction_status.to_lowercase().as_str() {
        "capture" => {
            if fraud_status.eq_ignore_ascii_case("accept") {
                (STATUS_SETTLEMENT.to_string(), true)
            } else {
                (STATUS_PENDING.to_string(), false)
            }
        }
        "settlement" => (STATUS_SETTLEMENT.to_string(), true),
        "cancel" => (STATUS_CANCELLED.to_string(), false),
        "expire" => (STATUS_EXPIRED.to_string(), false),
        "deny" => (STATUS_DENY.to_string(), false),
        _ => (transaction_status.to_uppercase(), false),
    }
}

/// The gateway reports settlement time in either RFC 3339 or
/// `YYYY-MM-DD HH:MM:SS`. Unparseable values are dropped rather than
/// failing the notification.
pub fn parse_settlement_time(raw: &str) -> Option<Timestamp> {
    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Some(ts);
    }
    jiff::civil::DateTime::strptime("%Y-%m-%d %H:%M:%S", raw)
        .ok()?
        .to_zoned(jiff::tz::TimeZone::UTC)
        .ok()
        .map(|zoned| zoned.timestamp())
}

/// Drive one gateway notification through the settlement state machine.
///
/// The caller has already verified the payload signature. Settlement
/// credits the topup sub-balance with the order's stored gross amount, at
/// most once per order: the `balance_applied` flag is re-checked by the
/// guarded UPDATE inside the same transaction as the credit, so a
/// concurrent duplicate delivery blocks on the row, re-evaluates the
/// predicate, matches zero rows, and credits nothing. Non-settling
/// statuses update order metadata only.
#[tracing::instrument(skip(payload, pool, time_source), fields(order_id = %payload.order_id))]
pub async fn apply_notification(
    payload: &GatewayNotification,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<(), StoreError> {
    let order = get_payment_order(&payload.order_id, pool).await?;

    let (new_status, settles) = map_notification_status(
        &payload.transaction_status,
        &payload.fraud_status,
    );
    let raw = serde_json::to_value(payload).map_err(anyhow::Error::from)?;
    let settled_at = if payload.settlement_time.is_empty() {
        None
    } else {
        parse_settlement_time(&payload.settlement_time)
    };
    let gateway_transaction_id = (!payload.transaction_id.is_empty())
        .then(|| payload.transaction_id.clone());

    let now = time_source.now();

    if settles && !order.balance_applied {
        let mut tx = pool.begin().await?;

        // The guard closes the race with a concurrent duplicate delivery:
        // whichever scope wins the row lock flips the flag, the loser
        // matches zero rows.
        let won = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = $2,
                gateway_transaction_id = COALESCE($3, gateway_transaction_id),
                raw_notification = $4,
                settled_at = COALESCE($5, settled_at),
                balance_applied = TRUE,
                updated_at = $6
            WHERE order_id = $1 AND balance_applied = FALSE
            "#,
        )
        .bind(&order.order_id)
        .bind(&new_status)
        .bind(&gateway_transaction_id)
        .bind(&raw)
        .bind(settled_at.map(|t| t.to_sqlx()))
        .bind(now.to_sqlx())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if won {
            let reference = if payload.transaction_id.is_empty() {
                order.order_id.clone()
            } else {
                payload.transaction_id.clone()
            };
            wallet::apply_balance_change_tx(
                &wallet::BalanceChange {
                    user_id: order.user_id,
                    delta_total: order.gross_amount,
                    delta_topup: order.gross_amount,
                    delta_redeem: Decimal::ZERO,
                    kind: TransactionKind::TopUp,
                    amount: order.gross_amount,
                    description: "Top up via payment gateway",
                    reference_id: Some(&reference),
                },
                now,
                &mut tx,
            )
            .await?;
        }

        tx.commit().await?;
        return Ok(());
    }

    update_payment_order(
        &order.order_id,
        &PaymentOrderUpdate {
            status: new_status,
            gateway_transaction_id,
            raw_notification: Some(raw),
            settled_at,
            balance_applied: None,
        },
        now,
        pool,
    )
    .await
}
