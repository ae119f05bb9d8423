//! Webhook signature contract and event payload parsing.

use nature_marketplace_api::services::webhook::{WebhookError, parse_event};
use nature_marketplace_api::stripe::webhook::{TOLERANCE_SECS, verify_signature};
use nature_marketplace_api::stripe::{CheckoutSession, PaymentIntent, SignatureError};
use nature_marketplace_integration_tests::{NOW, signature_header, webhook_secret};

const SESSION_COMPLETED: &str = r#"{
    "id": "evt_1QaZ",
    "type": "checkout.session.completed",
    "data": {"object": {
        "id": "cs_test_a1",
        "url": null,
        "payment_intent": "pi_3Qb",
        "customer": "cus_R2",
        "metadata": {"order_id": "6f1c0f7e-2a55-4c5e-9d8e-1b3a2c4d5e6f", "order_number": "NM-20261017-0042"}
    }}
}"#;

#[test]
fn signed_event_is_accepted() {
    let body = SESSION_COMPLETED.as_bytes();
    let header = signature_header(body, NOW);

    let event = parse_event(&webhook_secret(), body, Some(header.as_str()), NOW).unwrap();
    assert_eq!(event.kind, "checkout.session.completed");
    assert_eq!(event.id, "evt_1QaZ");
}

#[test]
fn any_matching_v1_passes_during_secret_rotation() {
    let body = SESSION_COMPLETED.as_bytes();
    let good = signature_header(body, NOW);
    let header = format!("t={NOW},v1={},{}", "0".repeat(64), &good[good.find("v1=").unwrap()..]);

    assert!(verify_signature(&webhook_secret(), body, &header, NOW).is_ok());
}

#[test]
fn edited_body_is_rejected() {
    let header = signature_header(SESSION_COMPLETED.as_bytes(), NOW);
    let tampered = SESSION_COMPLETED.replace("NM-20261017-0042", "NM-20261017-9999");

    assert_eq!(
        verify_signature(&webhook_secret(), tampered.as_bytes(), &header, NOW),
        Err(SignatureError::Mismatch)
    );
}

#[test]
fn tolerance_window_is_enforced() {
    let body = SESSION_COMPLETED.as_bytes();
    let edge = signature_header(body, NOW - TOLERANCE_SECS);
    let stale = signature_header(body, NOW - TOLERANCE_SECS - 1);

    assert!(verify_signature(&webhook_secret(), body, &edge, NOW).is_ok());
    assert_eq!(
        verify_signature(&webhook_secret(), body, &stale, NOW),
        Err(SignatureError::Stale)
    );
}

#[test]
fn forged_far_timestamps_are_rejected_without_panicking() {
    let body = SESSION_COMPLETED.as_bytes();
    let header = format!("t=-9223372036854775808,v1={}", "0".repeat(64));

    let err = parse_event(&webhook_secret(), body, Some(header.as_str()), NOW).unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature(SignatureError::Stale)));
    assert_eq!(err.to_string(), "Invalid signature");
}

#[test]
fn malformed_headers_are_rejected() {
    let body = b"{}";
    let without_signature = format!("t={NOW}");
    for header in ["", "v1=abc", "t=now,v1=abc", without_signature.as_str()] {
        assert_eq!(
            verify_signature(&webhook_secret(), body, header, NOW),
            Err(SignatureError::Malformed),
            "{header:?}"
        );
    }
}

#[test]
fn missing_header_and_bad_json_have_their_own_errors() {
    let missing = parse_event(&webhook_secret(), b"{}", None, NOW).unwrap_err();
    assert!(matches!(missing, WebhookError::MissingSignature));
    assert_eq!(missing.to_string(), "Missing Stripe signature");

    let body = b"not json";
    let header = signature_header(body, NOW);
    let invalid = parse_event(&webhook_secret(), body, Some(header.as_str()), NOW).unwrap_err();
    assert!(matches!(invalid, WebhookError::InvalidPayload));
}

#[test]
fn checkout_session_with_bare_ids() {
    let event: serde_json::Value = serde_json::from_str(SESSION_COMPLETED).unwrap();
    let session: CheckoutSession = serde_json::from_value(event["data"]["object"].clone()).unwrap();

    assert_eq!(session.id, "cs_test_a1");
    assert_eq!(session.payment_intent.as_ref().unwrap().id(), "pi_3Qb");
    assert!(session.payment_intent.as_ref().unwrap().as_object().is_none());
    assert_eq!(session.customer.as_ref().unwrap().id(), "cus_R2");
    assert_eq!(session.metadata["order_number"], "NM-20261017-0042");
}

#[test]
fn payment_intent_with_expanded_charge() {
    let intent: PaymentIntent = serde_json::from_str(
        r#"{
            "id": "pi_3Qb",
            "status": "succeeded",
            "latest_charge": {
                "id": "ch_9X",
                "amount_refunded": 0,
                "payment_method_details": {"card": {"brand": "visa", "last4": "4242"}}
            },
            "unknown_field": true
        }"#,
    )
    .unwrap();

    assert_eq!(intent.charge_id(), Some("ch_9X"));
    let card = intent.card().unwrap();
    assert_eq!(card.brand.as_deref(), Some("visa"));
    assert_eq!(card.last4.as_deref(), Some("4242"));
}

#[test]
fn payment_intent_with_legacy_charges_list() {
    let intent: PaymentIntent = serde_json::from_str(
        r#"{
            "id": "pi_old",
            "charges": {"data": [{"id": "ch_legacy"}]},
            "last_payment_error": {"code": "card_declined", "message": "Your card was declined."}
        }"#,
    )
    .unwrap();

    assert_eq!(intent.charge_id(), Some("ch_legacy"));
    assert!(intent.card().is_none());
    let error = intent.last_payment_error.unwrap();
    assert_eq!(error.code.as_deref(), Some("card_declined"));
}
