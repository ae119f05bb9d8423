//! Stripe REST API client.
//!
//! Stripe takes form-encoded bodies with bracketed keys and answers with
//! JSON. Failed calls carry an `{"error": {...}}` body.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use super::error::StripeError;
use super::types::{
    CheckoutRequest, CheckoutSession, ErrorResponse, PaymentIntent, PaymentIntentRequest, Refund,
};
use crate::config::StripeConfig;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    /// HTTP client.
    client: Client,
    /// Secret key for authentication.
    secret_key: SecretString,
    /// API base URL without trailing slash.
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let session: CheckoutSession = self
            .post_form("/checkout/sessions", &request.to_form())
            .await?;

        debug!(session_id = %session.id, "Checkout session created");

        Ok(session)
    }

    /// Create a payment intent for a custom payment form.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    pub async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, StripeError> {
        let intent: PaymentIntent = self
            .post_form("/payment_intents", &request.to_form())
            .await?;

        debug!(payment_intent_id = %intent.id, "Payment intent created");

        Ok(intent)
    }

    /// Refund `amount` minor units of a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self))]
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: i64,
    ) -> Result<Refund, StripeError> {
        let form = vec![
            ("payment_intent".to_string(), payment_intent_id.to_string()),
            ("amount".to_string(), amount.to_string()),
        ];

        let refund: Refund = self.post_form("/refunds", &form).await?;

        debug!(refund_id = %refund.id, amount = refund.amount, "Refund created");

        Ok(refund)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|r| r.error)
                .unwrap_or_default();

            error!(
                status = status.as_u16(),
                code = ?detail.code,
                "Stripe API error"
            );

            return Err(StripeError::Api {
                status: status.as_u16(),
                message: detail
                    .message
                    .unwrap_or_else(|| format!("Stripe returned {status}")),
                code: detail.code,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Response(e.to_string()))
    }
}
