//! Payment provider configuration
//!
//! Credentials and identifiers for the three payment channels. Secrets
//! stay as plain strings here and are wrapped in `SecretString` by the
//! adapters that consume them.

use serde::Deserialize;

use super::error::ValidationError;

/// Payment provider configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    /// Telegram Stars channel
    #[serde(default)]
    pub stars: StarsConfig,

    /// Payme merchant channel
    #[serde(default)]
    pub payme: PaymeConfig,

    /// Click merchant channel
    #[serde(default)]
    pub click: ClickConfig,
}

/// Telegram Stars configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StarsConfig {
    /// HMAC key for notification signatures
    pub webhook_secret: String,
}

/// Payme merchant configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymeConfig {
    /// Merchant id registered with Payme
    pub merchant_id: String,

    /// Merchant API password (Basic auth)
    pub secret_key: String,

    /// Use the test cashbox endpoint for checkout links
    #[serde(default)]
    pub test_mode: bool,
}

/// Click merchant configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickConfig {
    /// Merchant id registered with Click
    pub merchant_id: String,

    /// Service id within the merchant account
    pub service_id: String,

    /// Signing secret for sign_string checks
    pub secret_key: String,
}

impl ProvidersConfig {
    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stars.webhook_secret.is_empty() {
            return Err(ValidationError::EmptyProviderSecret("STARS_WEBHOOK_SECRET"));
        }
        if self.payme.merchant_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYME_MERCHANT_ID"));
        }
        if self.payme.secret_key.is_empty() {
            return Err(ValidationError::EmptyProviderSecret("PAYME_SECRET_KEY"));
        }
        if self.click.merchant_id.is_empty() {
            return Err(ValidationError::MissingRequired("CLICK_MERCHANT_ID"));
        }
        if self.click.service_id.is_empty() {
            return Err(ValidationError::MissingRequired("CLICK_SERVICE_ID"));
        }
        if self.click.secret_key.is_empty() {
            return Err(ValidationError::EmptyProviderSecret("CLICK_SECRET_KEY"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> ProvidersConfig {
        ProvidersConfig {
            stars: StarsConfig {
                webhook_secret: "stars-secret".to_string(),
            },
            payme: PaymeConfig {
                merchant_id: "merchant-1".to_string(),
                secret_key: "payme-secret".to_string(),
                test_mode: false,
            },
            click: ClickConfig {
                merchant_id: "12345".to_string(),
                service_id: "67890".to_string(),
                secret_key: "click-secret".to_string(),
            },
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(full_config().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_stars_secret() {
        let mut config = full_config();
        config.stars.webhook_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_missing_payme_secret() {
        let mut config = full_config();
        config.payme.secret_key.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_missing_click_service_id() {
        let mut config = full_config();
        config.click.service_id.clear();
        assert!(config.validate().is_err());
    }
}
