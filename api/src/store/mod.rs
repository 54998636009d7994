//! Database store module for the wallet API.
//!
//! ## Design Decisions
//!
//! ### Transactional scope is explicit
//! - Functions that must participate in a caller's transaction take a
//!   `&mut sqlx::Transaction` and carry a `_tx` suffix; standalone reads
//!   take the pool. Dropping a transaction without committing rolls the
//!   whole scope back, so a failure anywhere inside a multi-statement
//!   operation can never leave a balance delta without its history row.
//!
//! ### Locking discipline
//! - Any operation that reads a balance and then conditionally mutates it
//!   must read through `wallet::get_balance_for_update_tx`, which takes a
//!   `SELECT ... FOR UPDATE` row lock held until the scope ends. Credit-only
//!   paths skip the lock and rely on the single-statement upsert-with-delta
//!   instead, which is safe against lost updates on READ COMMITTED.
//!
//! ### Time Source Dependency
//! - Functions that need current time accept a `TimeSource` parameter
//!   instead of creating their own, so time can be mocked during tests.
//!   Each logical operation takes one reading and uses it throughout.
//!
//! ### Type Safety
//! - Id newtypes implement sqlx::Type, so they can be used directly with
//!   sqlx queries without accessing the inner UUID value (`.0`).

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTs;
use sqlx::{FromRow, PgPool};

use payloads::UserId;

pub mod payment;
pub mod voucher;
pub mod wallet;

pub use payment::{PaymentOrder, PayoutRequest};
pub use voucher::Voucher;
pub use wallet::{Transaction, WalletSummary};

#[derive(sqlx::Type)]
#[sqlx(transparent)]
struct OptionalTimestamp(Option<SqlxTs>);

impl From<OptionalTimestamp> for Option<Timestamp> {
    fn from(x: OptionalTimestamp) -> Option<Timestamp> {
        x.0.map(|x| x.to_jiff())
    }
}

/// Minimal user row backing the customer details sent to the checkout
/// gateway on top-up.
#[derive(Debug, Clone, FromRow)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub phone: Option<String>,
}

impl UserProfile {
    /// Display name derived from the email local part.
    pub fn display_name(&self) -> Option<String> {
        self.email
            .split_once('@')
            .filter(|(local, _)| !local.is_empty())
            .map(|(local, _)| local.to_string())
    }
}

pub async fn get_user_profile(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<UserProfile, StoreError> {
    sqlx::query_as::<_, UserProfile>(
        "SELECT id, email, phone FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::UserNotFound,
        e => StoreError::Database(e),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User not found")]
    UserNotFound,
    #[error("Wallet not found")]
    WalletNotFound,
    #[error("Voucher not found")]
    VoucherNotFound,
    #[error("Voucher is not active")]
    VoucherInactive,
    #[error("Voucher has expired")]
    VoucherExpired,
    #[error("Voucher already claimed")]
    VoucherAlreadyClaimed,
    #[error("Payment order not found")]
    PaymentOrderNotFound,
    #[error("Payout request not found")]
    PayoutRequestNotFound,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Unrecognized balance type")]
    UnknownBalanceKind,
    #[error("Amount must be positive")]
    AmountMustBePositive,
    #[error("Bank code, account number and account holder name are required")]
    MissingBankDetails,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}
