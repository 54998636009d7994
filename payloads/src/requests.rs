use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUp {
    pub user_id: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVoucher {
    pub user_id: UserId,
    pub code: String,
}

/// Withdrawal request. `balance_type` is free-form and normalized against
/// the synonym table in [`crate::BalanceKind::from_synonym`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdraw {
    pub user_id: UserId,
    pub amount: Decimal,
    pub balance_type: String,
    pub bank_code: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    pub account_number: String,
    pub account_holder_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Webhook body pushed by the payment gateway. Field names are the
/// gateway's wire format; absent fields deserialize to empty strings, which
/// the settlement state machine treats as "not provided".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub settlement_time: String,
}
