mod common;

use cnpay_backend::payments::encode::{checkout_fields_canonical, form_urlencode};
use cnpay_backend::payments::sign::check_mac_value;
use cnpay_backend::payments::types::{DeviceKind, GatewayParams, PaymentStatus, ProviderName};
use cnpay_backend::services::NotifyOutcome;
use cnpay_backend::store::PaymentStore;
use common::{new_payment, source_meta, stack, ALLPAY_STAGE_HASH_IV, ALLPAY_STAGE_HASH_KEY};

fn params(entries: &[(&str, &str)]) -> GatewayParams {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A gateway callback with a correctly computed CheckMacValue.
fn paid_callback(trade_no: &str) -> GatewayParams {
    let mut callback = params(&[
        ("MerchantID", "2000132"),
        ("MerchantTradeNo", trade_no),
        ("RtnCode", "1"),
        ("RtnMsg", "paid"),
        ("TradeNo", "AP20260805000001"),
        ("TradeAmt", "100"),
        ("PaymentDate", "2026/08/05 10:30:00"),
        ("PaymentType", "Alipay"),
    ]);
    let mac = check_mac_value(&checkout_fields_canonical(
        &callback,
        ALLPAY_STAGE_HASH_KEY,
        ALLPAY_STAGE_HASH_IV,
    ));
    callback.insert("CheckMacValue".to_string(), mac);
    callback
}

#[tokio::test]
async fn paid_callback_confirms_payment_and_acks() {
    let stack = stack(&[]);
    let record = stack
        .store
        .create(new_payment(ProviderName::Allpay, "CN20260805001"))
        .await
        .expect("create payment");

    // build the outbound request first, as the real flow does
    let artifact = stack
        .checkout
        .build(&record.token, DeviceKind::Desktop, &source_meta())
        .await
        .expect("build succeeds")
        .expect("artifact produced");
    match artifact {
        cnpay_backend::payments::types::CheckoutArtifact::Form(form) => {
            assert!(form.action.contains("allpay.com.tw"));
            assert!(form.fields.contains_key("CheckMacValue"));
            assert_eq!(
                form.fields.get("ChoosePayment").map(String::as_str),
                Some("Alipay")
            );
        }
        other => panic!("expected a form artifact, got {:?}", other),
    }

    let callback = paid_callback("CN20260805001");
    let raw = form_urlencode(&callback);
    let outcome = stack
        .ingest
        .allpay_async_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(outcome, NotifyOutcome::Text("1|OK".to_string()));

    let payment = stack
        .store
        .find_by_trade_no("CN20260805001")
        .await
        .expect("store reachable")
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Confirmed);
    assert_eq!(
        payment.payment_date.as_deref(),
        Some("2026/08/05 10:30:00")
    );
    assert!(payment.cash_flow_log.is_some());

    // exactly one audit entry, raw payload preserved byte for byte
    let entries = stack.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].raw_payload, raw);
    assert_eq!(entries[0].source_ip, "203.0.113.9");
}

#[tokio::test]
async fn tampered_mac_is_rejected_without_state_change() {
    let stack = stack(&[]);
    let record = stack
        .store
        .create(new_payment(ProviderName::Allpay, "CN20260805002"))
        .await
        .expect("create payment");
    stack
        .checkout
        .build(&record.token, DeviceKind::Desktop, &source_meta())
        .await
        .expect("build succeeds");

    let mut callback = paid_callback("CN20260805002");
    callback.insert("CheckMacValue".to_string(), "0".repeat(32));
    let raw = form_urlencode(&callback);

    let outcome = stack
        .ingest
        .allpay_async_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(outcome, NotifyOutcome::Text("0|ErrorMessage".to_string()));

    let payment = stack
        .store
        .find_by_trade_no("CN20260805002")
        .await
        .expect("store reachable")
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Input, "status unchanged");

    // the forged callback is still audited
    let entries = stack.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].raw_payload, raw);
}

#[tokio::test]
async fn unpaid_return_code_is_a_business_failure() {
    let stack = stack(&[]);
    stack
        .store
        .create(new_payment(ProviderName::Allpay, "CN20260805003"))
        .await
        .expect("create payment");

    let mut callback = params(&[
        ("MerchantID", "2000132"),
        ("MerchantTradeNo", "CN20260805003"),
        ("RtnCode", "10100058"),
        ("RtnMsg", "payment failed"),
    ]);
    let mac = check_mac_value(&checkout_fields_canonical(
        &callback,
        ALLPAY_STAGE_HASH_KEY,
        ALLPAY_STAGE_HASH_IV,
    ));
    callback.insert("CheckMacValue".to_string(), mac);
    let raw = form_urlencode(&callback);

    let outcome = stack
        .ingest
        .allpay_async_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(outcome, NotifyOutcome::Text("0|ErrorMessage".to_string()));

    let payment = stack
        .store
        .find_by_trade_no("CN20260805003")
        .await
        .expect("store reachable")
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Waiting, "no state change");
}

#[tokio::test]
async fn malformed_callback_still_gets_one_audit_entry() {
    let stack = stack(&[]);

    // no CheckMacValue at all
    let callback = params(&[("MerchantTradeNo", "CN404"), ("RtnCode", "1")]);
    let raw = form_urlencode(&callback);
    let outcome = stack
        .ingest
        .allpay_async_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(outcome, NotifyOutcome::Text("0|ErrorMessage".to_string()));

    let entries = stack.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].raw_payload, raw);
}

#[tokio::test]
async fn order_result_verification_failure_redirects_to_cancel() {
    let stack = stack(&[]);
    stack
        .store
        .create(new_payment(ProviderName::Allpay, "CN20260805004"))
        .await
        .expect("create payment");

    let mut callback = paid_callback("CN20260805004");
    callback.insert("CheckMacValue".to_string(), "f".repeat(32));
    let raw = form_urlencode(&callback);

    let outcome = stack
        .ingest
        .allpay_sync_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(outcome, NotifyOutcome::Redirect("/".to_string()));

    // the audit entry exists and is linked to the payment even though
    // verification failed
    assert_eq!(stack.audit.entries().len(), 1);
    let payment = stack
        .store
        .find_by_trade_no("CN20260805004")
        .await
        .expect("store reachable")
        .expect("payment exists");
    assert!(payment.cash_flow_log.is_some());
    assert_eq!(payment.status, PaymentStatus::Waiting);
}

#[tokio::test]
async fn order_result_success_redirects_to_orders() {
    let stack = stack(&[]);
    stack
        .store
        .create(new_payment(ProviderName::Allpay, "CN20260805005"))
        .await
        .expect("create payment");

    let callback = paid_callback("CN20260805005");
    let raw = form_urlencode(&callback);
    let outcome = stack
        .ingest
        .allpay_sync_notify(&raw, &callback, &source_meta())
        .await;
    assert_eq!(
        outcome,
        NotifyOutcome::Redirect("/profile/orders".to_string())
    );
}
