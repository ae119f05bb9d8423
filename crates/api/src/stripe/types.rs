//! Stripe API request and response types.
//!
//! Only the fields the marketplace reads are modelled; Stripe adds fields
//! freely, so every struct ignores unknown keys.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use nature_marketplace_core::CurrencyCode;

/// Stripe allows at most this many characters in `product_data[description]`.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A checkout line, already converted to minor units.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub description: String,
    pub unit_amount: i64,
    pub quantity: i32,
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub currency: CurrencyCode,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Form-encoded body for `POST /checkout/sessions`.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("customer_email".to_string(), self.customer_email.clone()),
        ];

        for (i, line) in self.lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.stripe_code().to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            let description: String = line.description.chars().take(MAX_DESCRIPTION_CHARS).collect();
            if !description.trim().is_empty() {
                form.push((
                    format!("{prefix}[price_data][product_data][description]"),
                    description,
                ));
            }
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        push_order_metadata(&mut form, "metadata", self.order_id, &self.order_number);
        push_order_metadata(
            &mut form,
            "payment_intent_data[metadata]",
            self.order_id,
            &self.order_number,
        );
        form
    }
}

/// Parameters for a payment intent.
#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: i64,
    pub currency: CurrencyCode,
}

impl PaymentIntentRequest {
    /// Form-encoded body for `POST /payment_intents`.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.stripe_code().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        push_order_metadata(&mut form, "metadata", self.order_id, &self.order_number);
        form
    }
}

fn push_order_metadata(form: &mut Vec<(String, String)>, key: &str, order_id: Uuid, number: &str) {
    form.push((format!("{key}[order_id]"), order_id.to_string()));
    form.push((format!("{key}[order_number]"), number.to_string()));
}

/// Either a bare object id or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

/// Objects that carry an `id`.
pub trait HasId {
    fn id(&self) -> &str;
}

impl<T: HasId> Expandable<T> {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(obj) => obj.id(),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(obj) => Some(obj.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent: Option<Expandable<PaymentIntent>>,
    pub customer: Option<Expandable<Customer>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

impl HasId for Customer {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: Option<String>,
    pub customer: Option<Expandable<Customer>>,
    pub latest_charge: Option<Expandable<Charge>>,
    /// Older API versions embed charges here instead of `latest_charge`.
    pub charges: Option<List<Charge>>,
    pub last_payment_error: Option<ApiErrorBody>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl HasId for PaymentIntent {
    fn id(&self) -> &str {
        &self.id
    }
}

impl PaymentIntent {
    /// Id of the charge that captured the money.
    #[must_use]
    pub fn charge_id(&self) -> Option<&str> {
        self.latest_charge.as_ref().map(Expandable::id).or_else(|| {
            self.charges
                .as_ref()
                .and_then(|list| list.data.first())
                .map(|charge| charge.id.as_str())
        })
    }

    /// Card details of the capturing charge, when Stripe included them.
    #[must_use]
    pub fn card(&self) -> Option<&CardDetails> {
        let charge = self
            .latest_charge
            .as_ref()
            .and_then(Expandable::as_object)
            .or_else(|| self.charges.as_ref().and_then(|list| list.data.first()))?;
        charge.payment_method_details.as_ref()?.card.as_ref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_refunded: i64,
    pub payment_method_details: Option<PaymentMethodDetails>,
}

impl HasId for Charge {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodDetails {
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub wallet: Option<Wallet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wallet {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

/// The `error` object of a failed API call or payment attempt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiErrorBody,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkout() -> CheckoutRequest {
        CheckoutRequest {
            order_id: Uuid::nil(),
            order_number: "NM-20261017-0042".to_string(),
            customer_email: "ana@bosque.org".to_string(),
            currency: CurrencyCode::EUR,
            lines: vec![CheckoutLine {
                name: "Ceiba Tree".to_string(),
                description: "x".repeat(600),
                unit_amount: 4500,
                quantity: 2,
            }],
            success_url: "http://localhost:3000/checkout/success".to_string(),
            cancel_url: "http://localhost:3000/cart".to_string(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_line_items() {
        let form = checkout().to_form();
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("4500"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][description]")
                .unwrap()
                .len(),
            MAX_DESCRIPTION_CHARS
        );
        assert_eq!(value(&form, "metadata[order_number]"), Some("NM-20261017-0042"));
        assert_eq!(
            value(&form, "payment_intent_data[metadata][order_id]"),
            Some("00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_checkout_form_skips_blank_description() {
        let mut request = checkout();
        request.lines[0].description = String::new();
        let form = request.to_form();
        assert!(value(&form, "line_items[0][price_data][product_data][description]").is_none());
    }

    #[test]
    fn test_payment_intent_charge_from_either_shape() {
        let expanded: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "latest_charge": {
                "id": "ch_1",
                "payment_method_details": {"card": {"brand": "visa", "last4": "4242", "wallet": null}}
            }
        }))
        .unwrap();
        assert_eq!(expanded.charge_id(), Some("ch_1"));
        assert_eq!(expanded.card().unwrap().last4.as_deref(), Some("4242"));

        let legacy: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_2",
            "charges": {"data": [{"id": "ch_2"}]}
        }))
        .unwrap();
        assert_eq!(legacy.charge_id(), Some("ch_2"));

        let bare: PaymentIntent =
            serde_json::from_value(serde_json::json!({"id": "pi_3", "latest_charge": "ch_3"}))
                .unwrap();
        assert_eq!(bare.charge_id(), Some("ch_3"));
        assert!(bare.card().is_none());
    }
}
