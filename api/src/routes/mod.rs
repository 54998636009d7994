pub mod wallet;

use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, http::StatusCode, web,
};

use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(wallet::get_balance)
        .service(wallet::list_transactions)
        .service(wallet::list_vouchers)
        .service(wallet::claim_voucher)
        .service(wallet::top_up)
        .service(wallet::withdraw)
        .service(wallet::payment_status)
        .service(wallet::payout_status)
        .service(wallet::payment_notification)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Conflict")]
    Conflict(#[source] anyhow::Error),
    /// Distinct from BadRequest so clients can render a dedicated message.
    #[error("Insufficient balance")]
    InsufficientBalance(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::Conflict(e) => {
                HttpResponse::Conflict().body(format!("{self}: {e}"))
            }
            Self::InsufficientBalance(e) => {
                HttpResponse::build(StatusCode::UNPROCESSABLE_ENTITY)
                    .body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) | StoreError::NotUnique(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::UserNotFound
            | StoreError::WalletNotFound
            | StoreError::PaymentOrderNotFound
            | StoreError::PayoutRequestNotFound => APIError::NotFound(e.into()),
            StoreError::VoucherInactive
            | StoreError::VoucherExpired
            | StoreError::VoucherAlreadyClaimed => APIError::Conflict(e.into()),
            StoreError::InsufficientBalance => {
                APIError::InsufficientBalance(e.into())
            }
            // An unknown voucher code is a client input problem, not a
            // missing resource.
            StoreError::VoucherNotFound
            | StoreError::UnknownBalanceKind
            | StoreError::AmountMustBePositive
            | StoreError::MissingBankDetails => APIError::BadRequest(e.into()),
            StoreError::UnexpectedError(_) => APIError::UnexpectedError(e.into()),
        }
    }
}
