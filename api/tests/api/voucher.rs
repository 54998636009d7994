use payloads::requests;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use test_helpers::{assert_status_code, spawn_app};

#[tokio::test]
async fn claiming_a_voucher_credits_the_redeem_balance() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("claim@example.com").await?;
    app.create_voucher("WELCOME50", Decimal::new(50_000, 0), true, None)
        .await?;

    app.client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "WELCOME50".into(),
        })
        .await?;

    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(50_000, 0));
    assert_eq!(summary.topup, Decimal::ZERO);
    assert_eq!(summary.redeem, Decimal::new(50_000, 0));
    assert_eq!(summary.total, summary.topup + summary.redeem);

    let entries = app.client.list_transactions(&user_id, None).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, payloads::TransactionKind::KlaimVoucher);
    assert_eq!(entries[0].amount, Decimal::new(50_000, 0));
    assert!(entries[0].reference_id.is_some());

    Ok(())
}

#[tokio::test]
async fn double_claim_conflicts_and_credits_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("double@example.com").await?;
    app.create_voucher("ONCE-ONLY", Decimal::new(25_000, 0), true, None)
        .await?;

    let details = requests::ClaimVoucher {
        user_id,
        code: "ONCE-ONLY".into(),
    };
    app.client.claim_voucher(&details).await?;

    let replay = app.client.claim_voucher(&details).await;
    assert_status_code(replay, StatusCode::CONFLICT);

    assert_eq!(app.claim_count(&user_id).await?, 1);
    assert_eq!(app.transaction_count(&user_id).await?, 1);
    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(25_000, 0));

    Ok(())
}

#[tokio::test]
async fn concurrent_claims_credit_exactly_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("race@example.com").await?;
    app.create_voucher("RACE-VOUCHER", Decimal::new(10_000, 0), true, None)
        .await?;

    let details = requests::ClaimVoucher {
        user_id,
        code: "RACE-VOUCHER".into(),
    };
    let (first, second) = tokio::join!(
        app.client.claim_voucher(&details),
        app.client.claim_voucher(&details),
    );

    let successes =
        [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one claim should win");
    for result in [first, second] {
        if result.is_err() {
            assert_status_code(result, StatusCode::CONFLICT);
        }
    }

    assert_eq!(app.claim_count(&user_id).await?, 1);
    assert_eq!(app.transaction_count(&user_id).await?, 1);
    let summary = app.client.get_balance(&user_id).await?;
    assert_eq!(summary.total, Decimal::new(10_000, 0));
    assert_eq!(summary.redeem, Decimal::new(10_000, 0));

    Ok(())
}

#[tokio::test]
async fn unknown_code_is_a_bad_request() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("nocode@example.com").await?;

    let result = app
        .client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "NO-SUCH-CODE".into(),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    // Codes shorter than the minimum are rejected before the lookup
    let result = app
        .client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "abc".into(),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn inactive_and_expired_vouchers_conflict() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("inactive@example.com").await?;
    app.create_voucher("DISABLED1", Decimal::new(5_000, 0), false, None)
        .await?;
    // Mock clock starts at 2025-01-01, so this expired a day earlier
    app.create_voucher(
        "EXPIRED01",
        Decimal::new(5_000, 0),
        true,
        Some("2024-12-31T00:00:00Z".parse()?),
    )
    .await?;

    let inactive = app
        .client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "DISABLED1".into(),
        })
        .await;
    assert_status_code(inactive, StatusCode::CONFLICT);

    let expired = app
        .client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "EXPIRED01".into(),
        })
        .await;
    assert_status_code(expired, StatusCode::CONFLICT);

    // No side effects from either rejection
    assert_eq!(app.transaction_count(&user_id).await?, 0);
    let balance = app.client.get_balance(&user_id).await;
    assert_status_code(balance, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn listing_skips_claimed_inactive_and_expired() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = app.create_user("list@example.com").await?;
    app.create_voucher("CLAIMABLE1", Decimal::new(1_000, 0), true, None)
        .await?;
    app.create_voucher("CLAIMED-01", Decimal::new(2_000, 0), true, None)
        .await?;
    app.create_voucher("DISABLED2", Decimal::new(3_000, 0), false, None)
        .await?;
    app.create_voucher(
        "EXPIRED02",
        Decimal::new(4_000, 0),
        true,
        Some("2024-06-01T00:00:00Z".parse()?),
    )
    .await?;

    app.client
        .claim_voucher(&requests::ClaimVoucher {
            user_id,
            code: "CLAIMED-01".into(),
        })
        .await?;

    let vouchers = app.client.list_vouchers(&user_id).await?;
    let codes: Vec<&str> =
        vouchers.iter().map(|v| v.code.as_str()).collect();
    assert_eq!(codes, vec!["CLAIMABLE1"]);

    Ok(())
}
