//! Shared fixtures: a scripted gateway HTTP stub and a fully wired
//! service stack over the in-memory stores.
#![allow(dead_code)]

use async_trait::async_trait;
use cnpay_backend::config::RoutesConfig;
use cnpay_backend::payments::error::{PaymentError, PaymentResult};
use cnpay_backend::payments::providers::{
    AlipayConfig, AlipayProvider, AllpayConfig, AllpayProvider, PaypalConfig, PaypalProvider,
};
use cnpay_backend::payments::types::{
    BillingContact, Money, ProviderName, PurchasedItem, SourceMeta,
};
use cnpay_backend::payments::utils::GatewayHttp;
use cnpay_backend::services::{CheckoutService, ExpressCheckout, NotifyIngest};
use cnpay_backend::store::memory::{InMemoryCashFlowAudit, InMemoryPaymentStore};
use cnpay_backend::store::{CashFlowAudit, NewPayment, PaymentStore};
use std::sync::{Arc, Mutex};

pub const ALLPAY_STAGE_HASH_KEY: &str = "5294y06JbISpM5x9";
pub const ALLPAY_STAGE_HASH_IV: &str = "v77hoKGq4kWxNNIS";

/// Gateway HTTP stub answering a scripted sequence of bodies and
/// recording every URL it was asked to fetch.
pub struct ScriptedHttp {
    responses: Mutex<Vec<Result<String, String>>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn returning(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses.iter().rev().map(|s| Ok(s.to_string())).collect(),
            ),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().expect("stub lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.urls.lock().expect("stub lock").len()
    }
}

#[async_trait]
impl GatewayHttp for ScriptedHttp {
    async fn get_text(&self, url: &str) -> PaymentResult<String> {
        self.urls.lock().expect("stub lock").push(url.to_string());
        match self.responses.lock().expect("stub lock").pop() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(PaymentError::NetworkError { message }),
            None => Err(PaymentError::NetworkError {
                message: "scripted responses exhausted".to_string(),
            }),
        }
    }
}

pub struct TestStack {
    pub store: Arc<InMemoryPaymentStore>,
    pub audit: Arc<InMemoryCashFlowAudit>,
    pub checkout: Arc<CheckoutService>,
    pub ingest: Arc<NotifyIngest>,
    pub http: Arc<ScriptedHttp>,
}

pub fn routes_config() -> RoutesConfig {
    RoutesConfig {
        public_base_url: "https://shop.example.com".to_string(),
        order_complete_path: "/profile/orders".to_string(),
        cancel_path: "/".to_string(),
    }
}

/// Wire the whole service stack over in-memory stores, with every
/// outbound gateway call answered by the scripted stub.
pub fn stack(responses: &[&str]) -> TestStack {
    let http = ScriptedHttp::returning(responses);
    let store = Arc::new(InMemoryPaymentStore::new());
    let audit = Arc::new(InMemoryCashFlowAudit::new());
    let routes = routes_config();

    let alipay = Arc::new(AlipayProvider::new(
        AlipayConfig {
            partner_id: "2088000000000000".to_string(),
            secret_key: "alipaysecret".to_string(),
            ..AlipayConfig::default()
        },
        http.clone(),
    ));
    let allpay = Arc::new(AllpayProvider::new(AllpayConfig::default()));
    let paypal = Arc::new(PaypalProvider::new(
        PaypalConfig {
            user: "merchant_api1.example.com".to_string(),
            pwd: "apipwd".to_string(),
            signature: "apisig".to_string(),
            ..PaypalConfig::default()
        },
        http.clone(),
    ));

    let store_dyn: Arc<dyn PaymentStore> = store.clone();
    let audit_dyn: Arc<dyn CashFlowAudit> = audit.clone();

    let express = Arc::new(ExpressCheckout::new(
        paypal,
        store_dyn.clone(),
        audit_dyn.clone(),
        routes.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        store_dyn.clone(),
        alipay.clone(),
        allpay.clone(),
        express.clone(),
        routes.clone(),
    ));
    let ingest = Arc::new(NotifyIngest::new(
        store_dyn,
        audit_dyn,
        alipay,
        allpay,
        express,
        routes,
    ));

    TestStack {
        store,
        audit,
        checkout,
        ingest,
        http,
    }
}

pub fn new_payment(variant: ProviderName, trade_no: &str) -> NewPayment {
    NewPayment {
        trade_no: trade_no.to_string(),
        variant,
        total: Money {
            amount: "100".to_string(),
            currency: "X".to_string(),
        },
        items: vec![
            PurchasedItem {
                name: "tea".to_string(),
                quantity: 1,
                price: 40,
            },
            PurchasedItem {
                name: "coffee".to_string(),
                quantity: 2,
                price: 30,
            },
        ],
        billing: BillingContact {
            email: "buyer@example.com".to_string(),
            phone: "0912345678".to_string(),
            full_name: "Test Buyer".to_string(),
        },
    }
}

pub fn source_meta() -> SourceMeta {
    SourceMeta {
        device: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        ip: "203.0.113.9".to_string(),
    }
}
