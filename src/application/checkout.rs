//! Checkout link builder.
//!
//! Produces the provider-hosted payment page URL for a parent and
//! tariff. The account reference embedded in the link is what the
//! provider later echoes back through its webhooks.

use std::sync::Arc;

use base64::Engine;

use crate::config::{ClickConfig, PaymeConfig};
use crate::domain::billing::{AccountRef, PaymentProvider, Tariff, TariffTable};
use crate::domain::foundation::{DomainError, ErrorCode, ParentId};
use crate::ports::ParentDirectory;

/// Where a payment begins for each provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutLink {
    /// Open this URL in the browser.
    Url(String),

    /// No URL: the invoice is raised inside the chat (Stars).
    InChatInvoice,
}

/// Builds provider checkout links.
pub struct CheckoutService {
    parents: Arc<dyn ParentDirectory>,
    tariffs: TariffTable,
    payme: PaymeConfig,
    click: ClickConfig,
}

impl CheckoutService {
    pub fn new(
        parents: Arc<dyn ParentDirectory>,
        tariffs: TariffTable,
        payme: PaymeConfig,
        click: ClickConfig,
    ) -> Self {
        Self {
            parents,
            tariffs,
            payme,
            click,
        }
    }

    /// Build the checkout entry point for one provider.
    ///
    /// # Errors
    ///
    /// Returns `ParentNotFound` when the parent id is unknown.
    pub async fn build_link(
        &self,
        parent_id: ParentId,
        tariff: Tariff,
        provider: PaymentProvider,
    ) -> Result<CheckoutLink, DomainError> {
        if !self.parents.exists(&parent_id).await? {
            return Err(DomainError::new(
                ErrorCode::ParentNotFound,
                format!("Unknown parent: {}", parent_id),
            ));
        }

        let account = AccountRef { parent_id, tariff }.encode();
        let price_uzs = self.tariffs.plan(tariff).price_uzs;

        let link = match provider {
            PaymentProvider::Stars => CheckoutLink::InChatInvoice,
            PaymentProvider::Payme => {
                // Payme packs the merchant, account and tiyin amount
                // into one base64 path segment.
                let params = format!(
                    "m={};ac.order_id={};a={}",
                    self.payme.merchant_id,
                    account,
                    price_uzs * 100
                );
                let encoded = base64::engine::general_purpose::STANDARD.encode(params);
                let host = if self.payme.test_mode {
                    "checkout.test.paycom.uz"
                } else {
                    "checkout.paycom.uz"
                };
                CheckoutLink::Url(format!("https://{}/{}", host, encoded))
            }
            PaymentProvider::Click => CheckoutLink::Url(format!(
                "https://my.click.uz/services/pay?service_id={}&merchant_id={}&amount={}&transaction_param={}",
                self.click.service_id, self.click.merchant_id, price_uzs, account
            )),
        };

        Ok(link)
    }
}
