use crowdfund_core::gateway::{signature, ChargeRequest, GatewayError, PaymentGateway, PaymentOutcome, SnapGateway};
use mockito::{Matcher, Server};
use serde_json::json;

#[tokio::test]
async fn test_create_charge_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/snap/v1/transactions")
        .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "transaction_details": { "order_id": "42", "gross_amount": 150000 }
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token":"snap-abc","redirect_url":"https://pay.example/v2/vtweb/snap-abc"}"#)
        .create_async()
        .await;

    let gateway = SnapGateway::new(server.url(), "SB-server-key".to_string(), None);
    let charge = gateway
        .create_charge(&ChargeRequest {
            transaction_id: 42,
            amount: 150_000,
        })
        .await
        .unwrap();

    assert_eq!(charge.payment_code, "snap-abc");
    assert_eq!(charge.redirect_url, "https://pay.example/v2/vtweb/snap-abc");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_charge_rejected_by_gateway() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/snap/v1/transactions")
        .with_status(401)
        .with_body(r#"{"error_messages":["Access denied"]}"#)
        .create_async()
        .await;

    let gateway = SnapGateway::new(server.url(), "wrong-key".to_string(), None);
    let err = gateway
        .create_charge(&ChargeRequest {
            transaction_id: 1,
            amount: 100,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected(_)));
}

#[tokio::test]
async fn test_create_charge_invalid_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/snap/v1/transactions")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let gateway = SnapGateway::new(server.url(), "key".to_string(), None);
    let err = gateway
        .create_charge(&ChargeRequest {
            transaction_id: 1,
            amount: 100,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_circuit_breaker_opens_after_consecutive_failures() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/snap/v1/transactions")
        .with_status(500)
        .expect_at_least(2)
        .create_async()
        .await;

    let gateway = SnapGateway::with_circuit_breaker(server.url(), "key".to_string(), None, 2, 60);
    let request = ChargeRequest {
        transaction_id: 9,
        amount: 100,
    };

    for _ in 0..2 {
        let err = gateway.create_charge(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    assert_eq!(gateway.circuit_state(), "open");
    let err = gateway.create_charge(&request).await.unwrap_err();
    assert!(matches!(err, GatewayError::CircuitBreakerOpen(_)));
}

#[test]
fn test_signed_notification_is_accepted() {
    let gateway = SnapGateway::new(
        "http://localhost".to_string(),
        "key".to_string(),
        Some("webhook-secret".to_string()),
    );
    let body = json!({
        "order_id": "12",
        "transaction_status": "capture",
        "fraud_status": "accept",
        "gross_amount": "5000.00"
    })
    .to_string();
    let sig = signature::sign("webhook-secret", body.as_bytes());

    let parsed = gateway.parse_notification(body.as_bytes(), Some(&sig)).unwrap();
    assert_eq!(parsed.transaction_id, 12);
    assert_eq!(parsed.outcome, PaymentOutcome::Success);
    assert_eq!(parsed.gross_amount, Some(5_000));

    let tampered = body.replace("5000.00", "9000.00");
    assert!(matches!(
        gateway.parse_notification(tampered.as_bytes(), Some(&sig)),
        Err(GatewayError::InvalidSignature)
    ));
}
