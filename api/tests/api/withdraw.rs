use payloads::requests;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use test_helpers::{assert_status_code, spawn_app};

fn withdraw_details(
    user_id: payloads::UserId,
    amount: i64,
    balance_type: &str,
) -> requests::Withdraw {
    requests::Withdraw {
        user_id,
        amount: Decimal::new(amount, 0),
        balance_type: balance_type.into(),
        bank_code: "bca".into(),
        bank_name: Some("Bank Central Asia".into()),
        account_number: "1234567890".into(),
        account_holder_name: "Test Holder".into(),
        email: Some("holder@example.com".into()),
        phone: None,
        notes: Some("withdrawal".into()),
    }
}

#[tokio::test]
async fn redeem_withdrawal_conserves_the_other_sub_balance()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("redeem-wd@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(200_000, 0), Decimal::new(50_000, 0))
        .await?;

    let receipt = app
        .client
        .withdraw(&withdraw_details(user_id, 50_000, "redeem"))
        .await?;

    // The mock payout gateway acknowledges synchronously
    assert_eq!(receipt.status, "QUEUED");

    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(200_000, 0));
    assert_eq!(summary.topup, Decimal::new(200_000, 0));
    assert_eq!(summary.redeem, Decimal::ZERO);
    assert_eq!(summary.total, summary.topup + summary.redeem);

    let entries = app.client.list_transactions(&user_id, None).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].kind,
        payloads::TransactionKind::TarikSaldoRefund
    );
    assert_eq!(entries[0].amount, Decimal::new(50_000, 0));

    // The payout request carries the gateway's acknowledgement
    let payout = app.client.payout_status(&receipt.payout_id).await?;
    assert_eq!(payout.status, "QUEUED");
    assert_eq!(payout.amount, Decimal::new(50_000, 0));
    assert_eq!(
        payout.gateway_payout_id.as_deref(),
        Some(format!("iris-{}", receipt.payout_id).as_str())
    );

    Ok(())
}

#[tokio::test]
async fn payout_status_of_unknown_request_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app
        .client
        .payout_status(&payloads::PayoutRequestId(uuid::Uuid::new_v4()))
        .await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn topup_synonyms_debit_the_topup_balance() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("topup-wd@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(80_000, 0), Decimal::new(20_000, 0))
        .await?;

    app.client
        .withdraw(&withdraw_details(user_id, 30_000, "pendapatan"))
        .await?;

    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(70_000, 0));
    assert_eq!(summary.topup, Decimal::new(50_000, 0));
    assert_eq!(summary.redeem, Decimal::new(20_000, 0));

    let entries = app.client.list_transactions(&user_id, None).await?;
    assert_eq!(
        entries[0].kind,
        payloads::TransactionKind::TarikSaldoPendapatan
    );

    Ok(())
}

#[tokio::test]
async fn insufficient_sub_balance_aborts_without_side_effects()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("insufficient@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(10_000, 0), Decimal::new(40_000, 0))
        .await?;

    // redeem holds 40k, ask for 50k
    let result = app
        .client
        .withdraw(&withdraw_details(user_id, 50_000, "redeem"))
        .await;
    assert_status_code(result, StatusCode::UNPROCESSABLE_ENTITY);

    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(50_000, 0));
    assert_eq!(summary.redeem, Decimal::new(40_000, 0));
    assert_eq!(app.transaction_count(&user_id).await?, 0);

    let payouts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payout_requests WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&app.db_pool)
    .await?;
    assert_eq!(payouts, 0, "aborted withdrawal must not leave a payout row");

    Ok(())
}

#[tokio::test]
async fn unknown_balance_type_is_rejected_before_the_store()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    // No wallet row exists; an unknown type must still be a 400, not a 404
    let user_id = app.create_user("unknown-type@example.com").await?;

    let result = app
        .client
        .withdraw(&withdraw_details(user_id, 10_000, "total"))
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn invalid_amounts_and_bank_details_are_bad_requests()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("invalid-wd@example.com").await?;
    app.seed_wallet(&user_id, Decimal::new(50_000, 0), Decimal::ZERO)
        .await?;

    let result = app
        .client
        .withdraw(&withdraw_details(user_id, 0, "topup"))
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let mut missing_bank = withdraw_details(user_id, 10_000, "topup");
    missing_bank.account_number = "  ".into();
    let result = app.client.withdraw(&missing_bank).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    assert_eq!(app.transaction_count(&user_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn withdrawal_without_a_wallet_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("no-wallet@example.com").await?;

    let result = app
        .client
        .withdraw(&withdraw_details(user_id, 10_000, "redeem"))
        .await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn total_must_also_cover_the_amount() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("total-check@example.com").await?;
    // Corrupted wallet: redeem alone exceeds total. The guard on total
    // still rejects the withdrawal.
    sqlx::query(
        r#"
        INSERT INTO wallet_summary (
            user_id, total_balance, topup_balance, redeem_balance,
            loyalty_points
        )
        VALUES ($1, 5000, -20000, 25000, 0)
        "#,
    )
    .bind(user_id)
    .execute(&app.db_pool)
    .await?;

    let result = app
        .client
        .withdraw(&withdraw_details(user_id, 10_000, "redeem"))
        .await;
    assert_status_code(result, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.transaction_count(&user_id).await?, 0);

    Ok(())
}
