//! Clients for the two external payment rails: the snap checkout gateway
//! (inbound top-ups) and the iris disbursement gateway (outbound payouts),
//! plus verification of the webhook signature the snap gateway attaches to
//! its notifications.
//!
//! Both clients make a single synchronous call; retry policy is the
//! caller's concern (withdrawals deliberately have none).

use anyhow::Result;
#[cfg(not(feature = "mock-gateway"))]
use anyhow::{Context, anyhow};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use payloads::requests::GatewayNotification;

/// Compute the hex-encoded SHA-512 the gateway uses to sign notifications:
/// `order_id + status_code + gross_amount + server_key`.
pub fn notification_signature(
    server_key: &str,
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_notification_signature(
    server_key: &str,
    payload: &GatewayNotification,
) -> bool {
    let expected = notification_signature(
        server_key,
        &payload.order_id,
        &payload.status_code,
        &payload.gross_amount,
    );
    expected == payload.signature_key
}

/// Server-held webhook verification material, shared with the notification
/// route.
pub struct WebhookSettings {
    pub server_key: SecretBox<String>,
    /// Optional shared secret checked against the X-Callback-Token header.
    pub callback_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapTransactionDetails {
    pub order_id: String,
    pub gross_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SnapCustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapOrder {
    pub transaction_details: SnapTransactionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<SnapCustomerDetails>,
}

/// Checkout handles issued by the gateway for a created order.
#[derive(Debug, Deserialize)]
pub struct SnapCheckout {
    pub token: String,
    pub redirect_url: String,
}

/// Client for creating checkout transactions on the snap gateway.
pub struct SnapClient {
    server_key: SecretBox<String>,
    base_url: String,
    #[cfg(not(feature = "mock-gateway"))]
    client: reqwest::Client,
}

impl SnapClient {
    pub fn new(server_key: SecretBox<String>, base_url: String) -> Self {
        Self {
            server_key,
            base_url,
            #[cfg(not(feature = "mock-gateway"))]
            client: reqwest::Client::new(),
        }
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.transaction_details.order_id))]
    #[cfg(not(feature = "mock-gateway"))]
    pub async fn create_transaction(
        &self,
        order: &SnapOrder,
    ) -> Result<SnapCheckout> {
        let response = self
            .client
            .post(&self.base_url)
            .basic_auth(self.server_key.expose_secret(), Some(""))
            .json(order)
            .send()
            .await
            .context("Failed to reach the snap gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "snap gateway rejected order creation: status={status} response={body}"
            ));
        }

        response
            .json::<SnapCheckout>()
            .await
            .context("Failed to decode snap checkout response")
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.transaction_details.order_id))]
    #[cfg(feature = "mock-gateway")]
    pub async fn create_transaction(
        &self,
        order: &SnapOrder,
    ) -> Result<SnapCheckout> {
        let order_id = &order.transaction_details.order_id;
        tracing::info!("Test mode: mock snap checkout for {order_id}");
        Ok(SnapCheckout {
            token: format!("snap-token-{order_id}"),
            redirect_url: format!("{}/redirect/{order_id}", self.base_url),
        })
    }
}

/// One payout entry in a disbursement request. Amounts are sent as whole
/// currency units in string form, per the gateway's wire format.
#[derive(Debug, Serialize)]
pub struct IrisPayout {
    pub amount: String,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub beneficiary_bank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub partner_trx_id: String,
}

#[cfg(not(feature = "mock-gateway"))]
#[derive(Debug, Serialize)]
struct IrisPayoutRequest {
    payouts: Vec<IrisPayout>,
}

#[cfg(not(feature = "mock-gateway"))]
#[derive(Debug, Deserialize)]
struct IrisPayoutEntry {
    payout_id: String,
    status: String,
}

#[cfg(not(feature = "mock-gateway"))]
#[derive(Debug, Deserialize)]
struct IrisPayoutResponse {
    #[serde(default)]
    payouts: Vec<IrisPayoutEntry>,
}

/// The gateway's acknowledgement of a single payout.
#[derive(Debug)]
pub struct IrisReceipt {
    pub payout_id: String,
    pub status: String,
}

/// Client for creating disbursements on the iris payout gateway.
pub struct IrisClient {
    client_key: SecretBox<String>,
    client_secret: SecretBox<String>,
    base_url: String,
    #[cfg(not(feature = "mock-gateway"))]
    client: reqwest::Client,
}

impl IrisClient {
    pub fn new(
        client_key: SecretBox<String>,
        client_secret: SecretBox<String>,
        base_url: String,
    ) -> Self {
        Self {
            client_key,
            client_secret,
            base_url,
            #[cfg(not(feature = "mock-gateway"))]
            client: reqwest::Client::new(),
        }
    }

    /// Whether payout credentials were provided. Without them the
    /// withdrawal flow leaves the payout request PENDING for manual
    /// processing.
    pub fn is_configured(&self) -> bool {
        !self.client_key.expose_secret().is_empty()
            && !self.client_secret.expose_secret().is_empty()
    }

    #[tracing::instrument(skip(self, payout), fields(partner_trx_id = %payout.partner_trx_id))]
    #[cfg(not(feature = "mock-gateway"))]
    pub async fn create_payout(
        &self,
        payout: IrisPayout,
    ) -> Result<IrisReceipt> {
        use base64::Engine;

        let auth = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.client_key.expose_secret(),
            self.client_secret.expose_secret()
        ));
        let body = IrisPayoutRequest {
            payouts: vec![payout],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Basic {auth}"))
            .json(&body)
            .send()
            .await
            .context("Failed to reach the iris gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "iris gateway rejected payout: status={status} response={text}"
            ));
        }

        let decoded = response
            .json::<IrisPayoutResponse>()
            .await
            .context("Failed to decode iris payout response")?;
        let entry = decoded
            .payouts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("iris payout response contained no payouts"))?;

        Ok(IrisReceipt {
            payout_id: entry.payout_id,
            status: entry.status,
        })
    }

    #[tracing::instrument(skip(self, payout), fields(partner_trx_id = %payout.partner_trx_id))]
    #[cfg(feature = "mock-gateway")]
    pub async fn create_payout(
        &self,
        payout: IrisPayout,
    ) -> Result<IrisReceipt> {
        tracing::info!(
            "Test mode: mock iris payout of {} to {}",
            payout.amount,
            payout.beneficiary_account
        );
        Ok(IrisReceipt {
            payout_id: format!("iris-{}", payout.partner_trx_id),
            status: "queued".to_string(),
        })
    }
}
