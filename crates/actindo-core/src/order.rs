//! # Order Export Rules
//!
//! The pure half of the order export: payment classification, bank data,
//! salutations and the arithmetic over order lines.
//!
//! ## Line Modes
//! ```text
//! ┌──────┬──────────────────┬──────────┬──────────────────────────────┐
//! │ mode │ meaning          │ type     │ export                       │
//! ├──────┼──────────────────┼──────────┼──────────────────────────────┤
//! │ 0    │ article          │ Lief     │ position                     │
//! │ 1    │ premium article  │ Lief     │ position + premium long text │
//! │ 2    │ voucher          │ NLeist   │ position                     │
//! │ 3    │ discount         │ -        │ folded into rabatt_betrag    │
//! │ 4    │ payment surcharge│ NLeist   │ position                     │
//! │ 10   │ bundle rebate    │ NLeist   │ position                     │
//! └──────┴──────────────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! A synthetic shipping line closes every position list; its tax rate is the
//! highest rate seen on any line, discounts included.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::price::{round2, to_decimal, to_f64};

/// Line mode of a discount line.
pub const MODE_DISCOUNT: i64 = 3;

/// Long text attached to premium lines.
pub const PREMIUM_LONG_TEXT: &str = "<p><i>Prämienartikel</i></p>";

/// Country code used when the order's country cannot be resolved.
pub const DEFAULT_COUNTRY: &str = "de";

/// Holder names that mean "no holder given".
const PLACEHOLDER_HOLDERS: [&str; 2] = ["", "Inhaber"];

static IBAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z]{2}[0-9]{2}[a-zA-Z0-9]{4}[0-9]{7}([a-zA-Z0-9]?){0,16}")
        .expect("IBAN is a valid regex pattern")
});

// =============================================================================
// Payment Classification
// =============================================================================

/// The hub's payment method codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentCode {
    /// Direct debit with national or IBAN account data.
    Debit,
    /// SEPA direct debit.
    SepaDebit,
    /// Cash on delivery.
    CashOnDelivery,
    Invoice,
    Prepayment,
    CreditCard,
    Giropay,
    BankTransfer,
    PayPal,
    Financing,
    InstantTransfer,
}

impl PaymentCode {
    /// Classifies a storefront payment mean by its internal name.
    ///
    /// Unknown names are reported as prepayment.
    pub fn classify(payment_name: &str) -> Self {
        match payment_name {
            "debit" | "debituos" | "uos_ut_ls" => PaymentCode::Debit,
            "sepa" => PaymentCode::SepaDebit,
            "cash" | "cashExpress" => PaymentCode::CashOnDelivery,
            "invoice" | "invoiceuos" => PaymentCode::Invoice,
            "prepayment" | "uos_ut_vk" | "prepaiduos" => PaymentCode::Prepayment,
            "credituos" | "uos_ut_kk" | "ipayment" => PaymentCode::CreditCard,
            "giropayuos" | "uos_ut_gp" => PaymentCode::Giropay,
            "uos_ut" => PaymentCode::BankTransfer,
            "paypal" | "paypalexpress" => PaymentCode::PayPal,
            "FinanzkaufBySantander" => PaymentCode::Financing,
            "sofortueberweisung" => PaymentCode::InstantTransfer,
            _ => PaymentCode::Prepayment,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentCode::Debit => "L",
            PaymentCode::SepaDebit => "LSCORE",
            PaymentCode::CashOnDelivery => "NN",
            PaymentCode::Invoice => "U",
            PaymentCode::Prepayment => "VK",
            PaymentCode::CreditCard => "KK",
            PaymentCode::Giropay => "GP",
            PaymentCode::BankTransfer => "UT",
            PaymentCode::PayPal => "PP",
            PaymentCode::Financing => "FZ",
            PaymentCode::InstantTransfer => "SU",
        }
    }
}

impl fmt::Display for PaymentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PaymentCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// Bank Data
// =============================================================================

/// Classic debit account data stored with the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebitAccount {
    pub account: String,
    pub bank_code: String,
    pub account_holder: String,
}

/// One stored SEPA mandate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SepaPaymentData {
    pub iban: String,
    pub bic: String,
    pub account_holder: String,
}

/// Bank fields of an exported order; only the filled ones are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BankDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kto_inhaber: Option<String>,
}

/// True when the account number contains something shaped like an IBAN.
pub fn looks_like_iban(account: &str) -> bool {
    IBAN.is_match(account)
}

fn holder(name: &str) -> Option<String> {
    (!PLACEHOLDER_HOLDERS.contains(&name)).then(|| name.to_string())
}

/// Bank data for the given payment code.
///
/// Only debit and SEPA debit carry bank data; every other code yields an
/// empty record.
pub fn bank_details(
    code: PaymentCode,
    debit: Option<&DebitAccount>,
    mandates: &[SepaPaymentData],
) -> BankDetails {
    match code {
        PaymentCode::Debit => {
            let Some(debit) = debit else {
                return BankDetails::default();
            };
            let mut details = if looks_like_iban(&debit.account) {
                BankDetails {
                    iban: Some(debit.account.clone()),
                    swift: Some(debit.bank_code.clone()),
                    ..BankDetails::default()
                }
            } else {
                BankDetails {
                    blz: Some(debit.bank_code.replace([' ', '-', '/'], "")),
                    kto: Some(debit.account.clone()),
                    ..BankDetails::default()
                }
            };
            details.kto_inhaber = holder(&debit.account_holder);
            details
        }
        PaymentCode::SepaDebit => mandates
            .iter()
            .find(|m| !m.iban.is_empty() && !m.bic.is_empty())
            .map(|m| BankDetails {
                iban: Some(m.iban.clone()),
                swift: Some(m.bic.clone()),
                kto_inhaber: holder(&m.account_holder),
                ..BankDetails::default()
            })
            .unwrap_or_default(),
        _ => BankDetails::default(),
    }
}

// =============================================================================
// Customer Presentation
// =============================================================================

const SALUTATIONS: [(&str, &str); 4] = [
    ("mr", "Herr"),
    ("mrs", "Frau"),
    ("ms", "Frau"),
    ("company", "Firma"),
];

/// Human readable salutation.
///
/// Accepts the storefront key or an already translated label; anything else
/// becomes "Herr".
pub fn salutation(key: &str) -> &'static str {
    SALUTATIONS
        .iter()
        .find(|(k, label)| *k == key || *label == key)
        .map(|(_, label)| *label)
        .unwrap_or(SALUTATIONS[0].1)
}

/// Language code from a shop locale (`de_DE` → `de`).
pub fn language_code(locale: &str) -> String {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Reverts the storefront's HTML escaping of article names.
pub fn decode_special_chars(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Lines
// =============================================================================

/// Hub position type for a line mode.
pub fn line_type(mode: i64) -> &'static str {
    match mode {
        0 | 1 => "Lief",
        _ => "NLeist",
    }
}

/// Article number of the synthetic shipping line.
pub fn shipping_number(dispatch_id: i64) -> String {
    format!("SHIPPING{dispatch_id}")
}

/// Net discount of an order: the absolute sum of all discount lines, each
/// taken net when it carries tax.
pub fn discount_amount(lines: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let mut total = Decimal::ZERO;
    for (price, tax_rate) in lines {
        let mut price = to_decimal(price);
        let tax_rate = to_decimal(tax_rate);
        if tax_rate > Decimal::ZERO {
            price /= Decimal::ONE + tax_rate / Decimal::ONE_HUNDRED;
        }
        total += price;
    }
    to_f64(round2(total.abs()))
}

/// Tax rate of the shipping line: the highest line rate, at least 0.
pub fn shipping_tax_rate(rates: impl IntoIterator<Item = f64>) -> f64 {
    rates.into_iter().fold(0.0, f64::max)
}

// =============================================================================
// Tests
// =============================================================================
