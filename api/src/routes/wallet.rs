use actix_web::{HttpRequest, HttpResponse, get, post, web};
use anyhow::anyhow;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use payloads::{UserId, requests, responses};

use crate::gateway::{
    self, IrisClient, IrisPayout, SnapClient, SnapCustomerDetails, SnapOrder,
    SnapTransactionDetails, WebhookSettings,
};
use crate::store::{self, payment, voucher, wallet};
use crate::telemetry::log_error;
use crate::time::TimeSource;

use super::APIError;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

#[tracing::instrument(skip(pool))]
#[get("/wallet/{user_id}/balance")]
pub async fn get_balance(
    user_id: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let summary =
        wallet::get_balance(&UserId(user_id.into_inner()), &pool).await?;

    Ok(HttpResponse::Ok().json(responses::BalanceSummary {
        total: summary.total_balance,
        topup: summary.topup_balance,
        redeem: summary.redeem_balance,
        loyalty_points: summary.loyalty_points,
    }))
}

#[tracing::instrument(skip(pool))]
#[get("/wallet/{user_id}/transactions")]
pub async fn list_transactions(
    user_id: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let entries = wallet::list_transactions(
        &UserId(user_id.into_inner()),
        query.limit,
        &pool,
    )
    .await?;

    let entries: Vec<responses::TransactionEntry> =
        entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(pool, time_source))]
#[get("/wallet/{user_id}/vouchers")]
pub async fn list_vouchers(
    user_id: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let vouchers = voucher::list_unclaimed_vouchers(
        &UserId(user_id.into_inner()),
        query.limit,
        &pool,
        &time_source,
    )
    .await?;

    let vouchers: Vec<responses::VoucherInfo> =
        vouchers.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(vouchers))
}

#[tracing::instrument(skip(details, pool, time_source), fields(user_id = %details.user_id))]
#[post("/wallet/claim_voucher")]
pub async fn claim_voucher(
    details: web::Json<requests::ClaimVoucher>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    if details.code.trim().len() < 6 {
        return Err(APIError::BadRequest(anyhow!(
            "voucher code must be at least 6 characters"
        )));
    }

    voucher::claim(&details.user_id, details.code.trim(), &pool, &time_source)
        .await?;

    Ok(HttpResponse::Created().json(responses::SuccessMessage {
        message: "voucher claimed".into(),
    }))
}

#[tracing::instrument(skip(details, pool, snap), fields(user_id = %details.user_id))]
#[post("/wallet/top_up")]
pub async fn top_up(
    details: web::Json<requests::TopUp>,
    pool: web::Data<PgPool>,
    snap: web::Data<SnapClient>,
) -> Result<HttpResponse, APIError> {
    if details.amount <= Decimal::ZERO {
        return Err(APIError::BadRequest(anyhow!("amount must be positive")));
    }

    let profile = store::get_user_profile(&details.user_id, &pool).await?;

    let order_id = format!("TOPUP-{}", Uuid::new_v4().simple());
    let order = SnapOrder {
        transaction_details: SnapTransactionDetails {
            order_id: order_id.clone(),
            gross_amount: details.amount,
        },
        customer_details: Some(SnapCustomerDetails {
            first_name: profile.display_name(),
            email: Some(profile.email),
            phone: profile.phone,
        }),
    };
    let checkout = snap.create_transaction(&order).await?;

    payment::create_payment_order(
        &payment::NewPaymentOrder {
            user_id: details.user_id,
            order_id: &order_id,
            gross_amount: details.amount,
            snap_token: &checkout.token,
            redirect_url: &checkout.redirect_url,
        },
        &pool,
    )
    .await?;

    Ok(HttpResponse::Created().json(responses::TopUpReceipt {
        order_id,
        snap_token: checkout.token,
        redirect_url: checkout.redirect_url,
        status: payment::STATUS_PENDING.to_string(),
    }))
}

/// Debit first, disburse second. The gateway call happens strictly after
/// the debit commits; if it fails the payout request stays PENDING and the
/// caller is told so, because the funds are already held.
#[tracing::instrument(skip(details, pool, iris, time_source), fields(user_id = %details.user_id))]
#[post("/wallet/withdraw")]
pub async fn withdraw(
    details: web::Json<requests::Withdraw>,
    pool: web::Data<PgPool>,
    iris: web::Data<IrisClient>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let payout = wallet::withdraw(&details, &pool, &time_source).await?;

    let mut status = payout.status.clone();
    if iris.is_configured() {
        let request = IrisPayout {
            amount: payout.amount.round_dp(0).to_string(),
            beneficiary_name: details.account_holder_name.clone(),
            beneficiary_account: details.account_number.clone(),
            beneficiary_bank: details.bank_code.clone(),
            beneficiary_email: details.email.clone(),
            notes: details.notes.clone(),
            partner_trx_id: payout.id.to_string(),
        };
        match iris.create_payout(request).await {
            Ok(receipt) => {
                let acknowledged = receipt.status.to_uppercase();
                let update = payment::PayoutRequestUpdate {
                    status: acknowledged.clone(),
                    gateway_payout_id: Some(receipt.payout_id),
                    raw_response: None,
                    completed_at: None,
                };
                match payment::update_payout_request(
                    &payout.id,
                    &update,
                    time_source.now(),
                    &pool,
                )
                .await
                {
                    Ok(()) => status = acknowledged,
                    Err(e) => log_error(e),
                }
            }
            // No retry: the payout stays PENDING for reconciliation.
            Err(e) => log_error(e),
        }
    }

    Ok(HttpResponse::Created().json(responses::WithdrawReceipt {
        payout_id: payout.id,
        status,
    }))
}

#[tracing::instrument(skip(pool))]
#[get("/wallet/payment/{order_id}")]
pub async fn payment_status(
    order_id: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let order = payment::get_payment_order(&order_id, &pool).await?;
    let status: responses::PaymentStatus = order.into();
    Ok(HttpResponse::Ok().json(status))
}

#[tracing::instrument(skip(pool))]
#[get("/wallet/payout/{payout_id}")]
pub async fn payout_status(
    payout_id: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let payout = payment::get_payout_request(
        &payloads::PayoutRequestId(payout_id.into_inner()),
        &pool,
    )
    .await?;
    let status: responses::PayoutStatus = payout.into();
    Ok(HttpResponse::Ok().json(status))
}

#[tracing::instrument(skip(request, payload, pool, time_source, webhook), fields(order_id = %payload.order_id))]
#[post("/wallet/payment/notification")]
pub async fn payment_notification(
    request: HttpRequest,
    payload: web::Json<requests::GatewayNotification>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
    webhook: web::Data<WebhookSettings>,
) -> Result<HttpResponse, APIError> {
    if let Some(expected) = &webhook.callback_token {
        let provided = request
            .headers()
            .get("X-Callback-Token")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Ok(
                HttpResponse::Forbidden().body("invalid callback token")
            );
        }
    }

    if !gateway::verify_notification_signature(
        webhook.server_key.expose_secret(),
        &payload,
    ) {
        return Err(APIError::BadRequest(anyhow!(
            "invalid gateway signature"
        )));
    }

    payment::apply_notification(&payload, &pool, &time_source).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}
