//! Decimal amounts, minor units, and checkout form encoding.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use nature_marketplace_api::models::order::OrderTotals;
use nature_marketplace_api::stripe::{CheckoutLine, CheckoutRequest, PaymentIntentRequest};
use nature_marketplace_core::{CurrencyCode, Price};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[test]
fn minor_units_round_trip_for_catalog_prices() {
    for amount in ["0.50", "19.99", "45.00", "1250.10"] {
        let price = Price::new(dec(amount), CurrencyCode::USD);
        let cents = price.to_minor_units().unwrap();
        assert_eq!(Price::from_minor_units(cents, CurrencyCode::USD).amount, dec(amount));
    }
}

#[test]
fn refunded_cents_become_decimal_amounts() {
    assert_eq!(Price::from_minor_units(4500, CurrencyCode::EUR).amount, dec("45"));
    assert_eq!(Price::from_minor_units(1, CurrencyCode::USD).amount, dec("0.01"));
}

#[test]
fn order_totals_sum_line_totals() {
    let totals = OrderTotals::from_line_totals([dec("90.00"), dec("12.50"), dec("0.99")]);

    assert_eq!(totals.subtotal, dec("103.49"));
    assert_eq!(totals.total_amount, dec("103.49"));
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.tax_amount, Decimal::ZERO);
}

#[test]
fn checkout_form_carries_lines_and_order_metadata() {
    let order_id = Uuid::new_v4();
    let request = CheckoutRequest {
        order_id,
        order_number: "NM-20261017-0042".to_string(),
        customer_email: "ana@bosque.org".to_string(),
        currency: CurrencyCode::EUR,
        lines: vec![
            CheckoutLine {
                name: "Ceiba Tree".to_string(),
                description: "A young ceiba in the Chocó".to_string(),
                unit_amount: 4500,
                quantity: 2,
            },
            CheckoutLine {
                name: "Lagoon Retreat".to_string(),
                description: "   ".to_string(),
                unit_amount: 32_000,
                quantity: 1,
            },
        ],
        success_url: "https://nature.test/ok".to_string(),
        cancel_url: "https://nature.test/cart".to_string(),
    };
    let form = request.to_form();

    assert_eq!(form_value(&form, "mode"), Some("payment"));
    assert_eq!(form_value(&form, "line_items[0][price_data][currency]"), Some("eur"));
    assert_eq!(form_value(&form, "line_items[0][price_data][unit_amount]"), Some("4500"));
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("2"));
    assert_eq!(
        form_value(&form, "line_items[1][price_data][product_data][description]"),
        None
    );
    assert_eq!(
        form_value(&form, "metadata[order_id]"),
        Some(order_id.to_string().as_str())
    );
    assert_eq!(
        form_value(&form, "payment_intent_data[metadata][order_number]"),
        Some("NM-20261017-0042")
    );
}

#[test]
fn payment_intent_form_uses_cents() {
    let price = Price::new(dec("89.90"), CurrencyCode::USD);
    let request = PaymentIntentRequest {
        order_id: Uuid::nil(),
        order_number: "NM-20261017-0001".to_string(),
        amount: price.to_minor_units().unwrap(),
        currency: price.currency_code,
    };
    let form = request.to_form();

    assert_eq!(form_value(&form, "amount"), Some("8990"));
    assert_eq!(form_value(&form, "currency"), Some("usd"));
    assert_eq!(form_value(&form, "automatic_payment_methods[enabled]"), Some("true"));
}
