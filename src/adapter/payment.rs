use async_trait::async_trait;

use crate::error::{ServiceError, ServiceResult};

const STRIPE_PAYMENT_INTENTS_URL: &str = "https://api.stripe.com/v1/payment_intents";

/// Seam to the external payment processor. The processor tokenizes the
/// payment and hands back an opaque client reference; money movement is
/// never handled locally.
#[async_trait(?Send)]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the given amount in cents and returns
    /// the client secret the donor-side widget needs.
    async fn create_payment_intent(&self, amount_cents: i64) -> ServiceResult<String>;
}

pub struct StripeGateway {
    secret_key: Option<String>,
    endpoint: String,
}

impl StripeGateway {
    pub fn new(secret_key: Option<String>) -> Self {
        StripeGateway {
            secret_key,
            endpoint: STRIPE_PAYMENT_INTENTS_URL.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(&self, amount_cents: i64) -> ServiceResult<String> {
        let key = self
            .secret_key
            .as_deref()
            .ok_or(ServiceError::AdapterNotConfigured)?;

        let client = awc::Client::default();
        let mut response = client
            .post(&self.endpoint)
            .insert_header(("Authorization", format!("Bearer {}", key)))
            .send_form(&[
                ("amount", amount_cents.to_string()),
                ("currency", "usd".to_string()),
                ("automatic_payment_methods[enabled]", "true".to_string()),
            ])
            .await
            .map_err(|e| ServiceError::Adapter(format!("Stripe request failed: {}", e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Adapter(format!("Stripe response was not JSON: {}", e)))?;

        if !response.status().is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(ServiceError::Adapter(format!(
                "Stripe rejected the payment intent: {}",
                message
            )));
        }

        body["client_secret"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ServiceError::Adapter("Stripe response missing client_secret".to_string()))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scriptable gateway for service-level tests. Records requested amounts
    /// and returns the configured outcome.
    pub struct ScriptedGateway {
        outcome: Result<String, &'static str>,
        not_configured: bool,
        pub requested_amounts: Mutex<Vec<i64>>,
    }

    impl ScriptedGateway {
        pub fn succeeding(client_secret: &str) -> Self {
            ScriptedGateway {
                outcome: Ok(client_secret.to_string()),
                not_configured: false,
                requested_amounts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &'static str) -> Self {
            ScriptedGateway {
                outcome: Err(message),
                not_configured: false,
                requested_amounts: Mutex::new(Vec::new()),
            }
        }

        pub fn unconfigured() -> Self {
            ScriptedGateway {
                outcome: Err("unconfigured"),
                not_configured: true,
                requested_amounts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl PaymentGateway for ScriptedGateway {
        async fn create_payment_intent(&self, amount_cents: i64) -> ServiceResult<String> {
            self.requested_amounts.lock().unwrap().push(amount_cents);
            if self.not_configured {
                return Err(ServiceError::AdapterNotConfigured);
            }
            match &self.outcome {
                Ok(secret) => Ok(secret.clone()),
                Err(message) => Err(ServiceError::Adapter((*message).to_string())),
            }
        }
    }
}
