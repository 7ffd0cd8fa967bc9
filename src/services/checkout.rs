//! Checkout build facade: load the payment, guard its status, dispatch
//! on the provider variant, and hand back the transport artifact.

use crate::api::routes;
use crate::config::RoutesConfig;
use crate::payments::error::PaymentError;
use crate::payments::providers::{AlipayProvider, AllpayProvider};
use crate::payments::types::{
    hash_join, CheckoutArtifact, CheckoutForm, DeviceKind, GatewayParams, PaymentStatus,
    ProviderName, SourceMeta,
};
use crate::services::express_checkout::{ExpressCheckout, ExpressCheckoutError};
use crate::store::{PaymentRecord, PaymentStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ExpressCheckoutError> for CheckoutError {
    fn from(err: ExpressCheckoutError) -> Self {
        match err {
            ExpressCheckoutError::Gateway(e) => CheckoutError::Gateway(e),
            ExpressCheckoutError::Store(e) => CheckoutError::Store(e),
        }
    }
}

pub struct CheckoutService {
    store: Arc<dyn PaymentStore>,
    alipay: Arc<AlipayProvider>,
    allpay: Arc<AllpayProvider>,
    express: Arc<ExpressCheckout>,
    routes: RoutesConfig,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        alipay: Arc<AlipayProvider>,
        allpay: Arc<AllpayProvider>,
        express: Arc<ExpressCheckout>,
        routes: RoutesConfig,
    ) -> Self {
        Self {
            store,
            alipay,
            allpay,
            express,
            routes,
        }
    }

    /// Build the checkout artifact for a waiting payment.
    ///
    /// Construction failures (a missing field, a rejected handshake)
    /// surface before any status change. Once the artifact exists, the
    /// `Waiting -> Input` transition is taken atomically; `Ok(None)`
    /// means another caller already opened a gateway session for this
    /// payment and the artifact is discarded rather than handed back.
    pub async fn build(
        &self,
        payment_token: &str,
        device: DeviceKind,
        meta: &SourceMeta,
    ) -> CheckoutResult<Option<CheckoutArtifact>> {
        let payment = self
            .store
            .find_by_token(payment_token)
            .await?
            .ok_or_else(|| CheckoutError::PaymentNotFound(payment_token.to_string()))?;

        let artifact = match payment.variant {
            ProviderName::Alipay => self.build_alipay(&payment)?,
            ProviderName::Allpay => self.build_allpay(&payment, device)?,
            ProviderName::Paypal => {
                CheckoutArtifact::Form(self.express.start(&payment, meta).await?)
            }
        };

        let won = self
            .store
            .try_transition(payment.id, PaymentStatus::Waiting, PaymentStatus::Input)
            .await?;
        if !won {
            info!(trade_no = %payment.trade_no, "checkout already in progress, declining");
            return Ok(None);
        }
        Ok(Some(artifact))
    }

    fn build_alipay(&self, payment: &PaymentRecord) -> CheckoutResult<CheckoutArtifact> {
        let mut params = GatewayParams::new();
        params.insert("out_trade_no".to_string(), payment.trade_no.clone());
        params.insert(
            "subject".to_string(),
            hash_join(payment.items.iter().map(|item| item.name.clone())),
        );
        params.insert("total_fee".to_string(), payment.total.whole_units()?);
        params.insert(
            "notify_url".to_string(),
            self.routes.absolute(routes::ALIPAY_ASYNC_NOTIFY),
        );
        params.insert(
            "return_url".to_string(),
            self.routes.absolute(routes::ALIPAY_SYNC_NOTIFY),
        );

        let url = self.alipay.create_direct_pay_by_user_url(&params)?;
        Ok(CheckoutArtifact::RedirectUrl { url })
    }

    fn build_allpay(
        &self,
        payment: &PaymentRecord,
        device: DeviceKind,
    ) -> CheckoutResult<CheckoutArtifact> {
        let item_names = hash_join(payment.items.iter().map(|item| item.name.clone()));
        let item_counts = hash_join(payment.items.iter().map(|item| item.quantity));
        let item_prices = hash_join(payment.items.iter().map(|item| item.price));

        let mut params = GatewayParams::new();
        params.insert("MerchantTradeNo".to_string(), payment.trade_no.clone());
        params.insert("MerchantTradeDate".to_string(), payment.trade_date());
        params.insert("TotalAmount".to_string(), payment.total.whole_units()?);
        params.insert("TradeDesc".to_string(), "online order".to_string());
        params.insert("ItemName".to_string(), item_names.clone());
        params.insert("AlipayItemName".to_string(), item_names);
        params.insert("AlipayItemCounts".to_string(), item_counts);
        params.insert("AlipayItemPrice".to_string(), item_prices);
        params.insert("Email".to_string(), payment.billing.email.clone());
        params.insert("PhoneNo".to_string(), payment.billing.phone.clone());
        params.insert("UserName".to_string(), payment.billing.full_name.clone());
        params.insert(
            "ReturnURL".to_string(),
            self.routes.absolute(routes::ALLPAY_ASYNC_NOTIFY),
        );
        params.insert(
            "OrderResultURL".to_string(),
            self.routes.absolute(routes::ALLPAY_SYNC_NOTIFY),
        );

        let fields = match device {
            DeviceKind::Mobile => self.allpay.create_mobile_page_pay(&params)?,
            DeviceKind::Desktop => self.allpay.create_alipay(&params)?,
        };
        Ok(CheckoutArtifact::Form(CheckoutForm {
            action: self.allpay.endpoint().to_string(),
            fields,
        }))
    }
}
