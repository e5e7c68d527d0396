//! Value objects shared by the commerce aggregates

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationError;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub const MAX_LEN: usize = 50;

    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }

    /// Random SKU for products created without one.
    pub fn generate(prefix: &str) -> Self {
        let prefix: String = prefix.chars().filter(|c| c.is_ascii_alphanumeric()).take(6).collect();
        let prefix = if prefix.is_empty() { "SKU".to_string() } else { prefix.to_uppercase() };
        Self(format!("{}-{:08X}", prefix, rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU too long") }
    }
}

/// Money value object. Amounts are VAT inclusive unless stated otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount: round_cents(amount), currency: currency.to_uppercase() } }
    pub fn zar(amount: Decimal) -> Self { Self::new(amount, "ZAR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Amount in the currency's minor unit (cents), as payment gateways expect it.
    pub fn minor_units(&self) -> i64 {
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
    }

    pub fn from_minor_units(minor: i64, currency: &str) -> Self {
        Self::new(Decimal::new(minor, 2), currency)
    }

    /// Two-decimal string, e.g. `1299.00`.
    pub fn to_decimal_string(&self) -> String { format!("{:.2}", self.amount) }
}

impl Default for Money { fn default() -> Self { Self::zero("ZAR") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {:.2}", self.currency, self.amount) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Rounds half away from zero to cents.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price without VAT for a VAT inclusive `price` at `rate` (0.15 for 15%).
pub fn ex_vat(price: Decimal, rate: Decimal) -> Decimal {
    if rate <= Decimal::ZERO { return round_cents(price); }
    round_cents(price / (Decimal::ONE + rate))
}

/// VAT portion contained in a VAT inclusive amount.
pub fn vat_portion(inclusive: Decimal, rate: Decimal) -> Decimal {
    round_cents(inclusive) - ex_vat(inclusive, rate)
}

pub fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO { return Ok(()); }
    let mut err = ValidationError::new("positive");
    err.message = Some("must be greater than zero".into());
    Err(err)
}

pub fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO { return Ok(()); }
    let mut err = ValidationError::new("non_negative");
    err.message = Some("cannot be negative".into());
    Err(err)
}

/// Rejects text that is empty once surrounding whitespace is trimmed.
pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if !value.trim().is_empty() { return Ok(()); }
    let mut err = ValidationError::new("blank");
    err.message = Some("cannot be blank".into());
    Err(err)
}

/// URL slug: lowercase ascii alphanumerics separated by single hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() { slug.push('-'); }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
