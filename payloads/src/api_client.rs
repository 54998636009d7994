use reqwest::StatusCode;
use serde::Serialize;

use crate::{UserId, requests, responses};

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the wallet backend.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn get_balance(
        &self,
        user_id: &UserId,
    ) -> Result<responses::BalanceSummary, ClientError> {
        let response =
            self.empty_get(&format!("wallet/{user_id}/balance")).await?;
        ok_body(response).await
    }

    pub async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: Option<i64>,
    ) -> Result<Vec<responses::TransactionEntry>, ClientError> {
        let path = match limit {
            Some(limit) => {
                format!("wallet/{user_id}/transactions?limit={limit}")
            }
            None => format!("wallet/{user_id}/transactions"),
        };
        let response = self.empty_get(&path).await?;
        ok_body(response).await
    }

    pub async fn list_vouchers(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<responses::VoucherInfo>, ClientError> {
        let response =
            self.empty_get(&format!("wallet/{user_id}/vouchers")).await?;
        ok_body(response).await
    }

    pub async fn claim_voucher(
        &self,
        details: &requests::ClaimVoucher,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response = self.post("wallet/claim_voucher", details).await?;
        ok_body(response).await
    }

    pub async fn top_up(
        &self,
        details: &requests::TopUp,
    ) -> Result<responses::TopUpReceipt, ClientError> {
        let response = self.post("wallet/top_up", details).await?;
        ok_body(response).await
    }

    pub async fn withdraw(
        &self,
        details: &requests::Withdraw,
    ) -> Result<responses::WithdrawReceipt, ClientError> {
        let response = self.post("wallet/withdraw", details).await?;
        ok_body(response).await
    }

    pub async fn payment_status(
        &self,
        order_id: &str,
    ) -> Result<responses::PaymentStatus, ClientError> {
        let response =
            self.empty_get(&format!("wallet/payment/{order_id}")).await?;
        ok_body(response).await
    }

    pub async fn payout_status(
        &self,
        payout_id: &crate::PayoutRequestId,
    ) -> Result<responses::PayoutStatus, ClientError> {
        let response =
            self.empty_get(&format!("wallet/payout/{payout_id}")).await?;
        ok_body(response).await
    }

    /// Deliver a gateway notification, optionally with the shared callback
    /// token header.
    pub async fn payment_notification(
        &self,
        payload: &requests::GatewayNotification,
        callback_token: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut request = self
            .inner_client
            .post(self.format_url("wallet/payment/notification"))
            .json(payload);
        if let Some(token) = callback_token {
            request = request.header("X-Callback-Token", token);
        }
        let response = request.send().await?;
        ok_empty(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
