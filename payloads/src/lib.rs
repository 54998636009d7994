use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod requests;
pub mod responses;

mod api_client;
pub use api_client::{APIClient, ClientError, ok_body, ok_empty};

/// Id type wrappers help ensure we don't mix up ids for different tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UserId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct TransactionId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct VoucherId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct PaymentOrderId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct PayoutRequestId(pub Uuid);

/// Ledger entry type. The amount column stores an unsigned magnitude; the
/// direction of the balance change is implied by the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "transaction_kind", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum TransactionKind {
    TopUp,
    KlaimVoucher,
    TarikSaldoPendapatan,
    TarikSaldoRefund,
}

/// The two sub-balances whose sum is the total balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    Topup,
    Redeem,
}

impl BalanceKind {
    /// Normalize the free-form `balance_type` clients send. The accepted
    /// spellings are a fixed table; anything else is rejected by the caller.
    pub fn from_synonym(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "topup" | "saldo_topup" | "pendapatan" | "deposit"
            | "saldo_deposit" => Some(Self::Topup),
            "redeem" | "saldo_redeem" | "refund" | "saldo_refund" | "ev"
            | "ev_poin" => Some(Self::Redeem),
            _ => None,
        }
    }
}
