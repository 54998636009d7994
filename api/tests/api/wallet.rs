use jiff::Span;
use payloads::requests;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use test_helpers::{assert_status_code, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn balance_of_unknown_user_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app.client.get_balance(&payloads::UserId(Uuid::new_v4())).await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn seeded_balance_reads_back() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("wallet-read@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(150_000, 0), Decimal::new(25_000, 0))
        .await?;

    let summary = app.client.get_balance(&user_id).await?;

    assert_eq!(summary.total, Decimal::new(175_000, 0));
    assert_eq!(summary.topup, Decimal::new(150_000, 0));
    assert_eq!(summary.redeem, Decimal::new(25_000, 0));
    assert_eq!(summary.loyalty_points, 0);
    assert_eq!(summary.total, summary.topup + summary.redeem);

    Ok(())
}

#[tokio::test]
async fn top_up_creates_a_pending_order() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("topup@example.com").await?;

    let receipt = app
        .client
        .top_up(&requests::TopUp {
            user_id,
            amount: Decimal::new(100_000, 0),
        })
        .await?;

    assert!(receipt.order_id.starts_with("TOPUP-"));
    assert_eq!(receipt.status, "PENDING");
    assert!(!receipt.snap_token.is_empty());
    assert!(!receipt.redirect_url.is_empty());

    // The order is queryable and no balance was credited yet
    let status = app.client.payment_status(&receipt.order_id).await?;
    assert_eq!(status.status, "PENDING");
    assert_eq!(status.amount, Decimal::new(100_000, 0));
    assert_eq!(status.settled_at, None);

    let balance = app.client.get_balance(&user_id).await;
    assert_status_code(balance, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn top_up_rejects_non_positive_amounts() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("topup-zero@example.com").await?;

    let result = app
        .client
        .top_up(&requests::TopUp {
            user_id,
            amount: Decimal::ZERO,
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn payment_status_of_unknown_order_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app.client.payment_status("TOPUP-doesnotexist").await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn transactions_list_newest_first_with_limit() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("history@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(500_000, 0), Decimal::ZERO)
        .await?;

    // Three withdrawals at distinct times
    for (i, amount) in [10_000i64, 20_000, 30_000].iter().enumerate() {
        app.client
            .withdraw(&requests::Withdraw {
                user_id,
                amount: Decimal::new(*amount, 0),
                balance_type: "topup".into(),
                bank_code: "bca".into(),
                bank_name: Some("Bank Central Asia".into()),
                account_number: "1234567890".into(),
                account_holder_name: format!("Holder {i}"),
                email: None,
                phone: None,
                notes: None,
            })
            .await?;
        app.time_source.advance(Span::new().minutes(1));
    }

    let entries = app.client.list_transactions(&user_id, None).await?;
    assert_eq!(entries.len(), 3);
    // Newest first: the 30k withdrawal happened last
    assert_eq!(entries[0].amount, Decimal::new(30_000, 0));
    assert_eq!(entries[2].amount, Decimal::new(10_000, 0));
    assert!(entries[0].created_at >= entries[1].created_at);

    let limited = app.client.list_transactions(&user_id, Some(2)).await?;
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].amount, Decimal::new(30_000, 0));

    Ok(())
}
