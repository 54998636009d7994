use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    PaymentOrderId, PayoutRequestId, TransactionId, TransactionKind, VoucherId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total: Decimal,
    pub topup: Decimal,
    pub redeem: Decimal,
    pub loyalty_points: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherInfo {
    pub id: VoucherId,
    pub code: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub expires_at: Option<Timestamp>,
}

/// Returned from top-up initiation; the token and redirect URL come from
/// the payment gateway's checkout response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpReceipt {
    pub order_id: String,
    pub snap_token: String,
    pub redirect_url: String,
    pub status: String,
}

/// Returned from a withdrawal. The status is PENDING unless the payout
/// gateway acknowledged the disbursement synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub payout_id: PayoutRequestId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutStatus {
    pub id: PayoutRequestId,
    pub amount: Decimal,
    pub status: String,
    pub gateway_payout_id: Option<String>,
    pub requested_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub id: PaymentOrderId,
    pub order_id: String,
    pub status: String,
    pub amount: Decimal,
    pub snap_token: String,
    pub redirect_url: String,
    pub settled_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    pub message: String,
}
