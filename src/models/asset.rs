use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{check_max_digits, check_max_len, check_required_text, double_option, required};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::models::CategoryView;

db_enum! {
    pub enum AssetType ("asset type") {
        Stock => "STOCK",
        Bond => "BOND",
        Crypto => "CRYPTO",
        RealEstate => "REAL_ESTATE",
        Commodity => "COMMODITY",
        Cash => "CASH",
        Etf => "ETF",
        MutualFund => "MUTUAL_FUND",
        Derivative => "DERIVATIVE",
        Other => "OTHER",
    }
}

db_enum! {
    pub enum AssetStatus ("asset status") {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Pending => "PENDING",
        Suspended => "SUSPENDED",
        Delisted => "DELISTED",
        Sold => "SOLD",
    }
}

db_enum! {
    pub enum RiskLevel ("risk level") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        VeryHigh => "VERY_HIGH",
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub category_id: Option<Uuid>,
    pub description: String,
    pub company_name: String,
    pub website_url: String,
    pub current_price: Decimal,
    pub currency: String,
    pub market_cap: Option<Decimal>,
    pub risk_level: RiskLevel,
    pub beta: Option<Decimal>,
    pub dividend_yield: Option<Decimal>,
    pub status: AssetStatus,
    pub exchange: String,
    pub isin: Option<String>,
    pub price_last_updated: Option<DateTime<Utc>>,
    pub day_high: Option<Decimal>,
    pub day_low: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn validate(&self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", &self.name, 200);
        check_required_text(&mut errors, "symbol", &self.symbol, 20);
        check_max_len(&mut errors, "company_name", &self.company_name, 200);
        check_max_len(&mut errors, "exchange", &self.exchange, 100);

        if self.current_price <= Decimal::ZERO {
            errors.add("current_price", "Price must be greater than zero");
        } else {
            check_max_digits(&mut errors, "current_price", self.current_price, 15, 2);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            errors.add("currency", "Currency must be a 3-letter code (e.g. USD).");
        }
        match self.market_cap {
            Some(cap) if cap < Decimal::ZERO => {
                errors.add("market_cap", "Ensure this value is greater than or equal to 0.")
            }
            Some(cap) => check_max_digits(&mut errors, "market_cap", cap, 20, 2),
            None => {}
        }
        if let Some(beta) = self.beta {
            check_max_digits(&mut errors, "beta", beta, 5, 3);
        }
        if let Some(dividend_yield) = self.dividend_yield {
            if dividend_yield < Decimal::ZERO || dividend_yield > Decimal::ONE_HUNDRED {
                errors.add("dividend_yield", "Dividend yield must be between 0 and 100.");
            } else {
                check_max_digits(&mut errors, "dividend_yield", dividend_yield, 5, 2);
            }
        }
        for (field, price) in [("day_high", self.day_high), ("day_low", self.day_low)] {
            if let Some(price) = price {
                check_max_digits(&mut errors, field, price, 15, 2);
            }
        }
        if !self.website_url.is_empty() && !is_web_url(&self.website_url) {
            errors.add("website_url", "Enter a valid URL.");
        }
        if let Some(isin) = &self.isin {
            if isin.chars().count() != 12 {
                errors.add("isin", "ISIN must be exactly 12 characters");
            }
        }
        if let (Some(high), Some(low)) = (self.day_high, self.day_low) {
            if high < low {
                errors.add("day_high", "Day high cannot be less than day low");
            }
        }
        errors.into_result()
    }

    /// Moves the quoted price, widening the day range when asked to.
    pub fn apply_price(&mut self, price: Decimal, track_high_low: bool, now: DateTime<Utc>) {
        self.current_price = price;
        self.price_last_updated = Some(now);
        if track_high_low {
            if self.day_high.map_or(true, |high| price > high) {
                self.day_high = Some(price);
            }
            if self.day_low.map_or(true, |low| price < low) {
                self.day_low = Some(price);
            }
        }
        self.updated_at = now;
    }

    pub fn price_updated_ago(&self, now: DateTime<Utc>) -> Option<f64> {
        self.price_last_updated
            .map(|at| (now - at).num_milliseconds() as f64 / 1000.0)
    }
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn normalize_isin(isin: Option<String>) -> Option<String> {
    isin.map(|value| value.trim().to_uppercase())
        .filter(|value| !value.is_empty())
}

/// Lightweight representation used by list endpoints and nested views.
#[derive(Serialize, Debug, Clone)]
pub struct AssetListItem {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub current_price: Decimal,
    pub currency: String,
    pub market_cap: Option<Decimal>,
    pub status: AssetStatus,
    pub category_name: Option<String>,
    pub total_volume: Decimal,
    pub created_at: DateTime<Utc>,
}

impl AssetListItem {
    pub fn new(asset: &Asset, category_name: Option<String>, total_volume: Decimal) -> Self {
        AssetListItem {
            id: asset.id,
            name: asset.name.clone(),
            symbol: asset.symbol.clone(),
            asset_type: asset.asset_type,
            current_price: asset.current_price,
            currency: asset.currency.clone(),
            market_cap: asset.market_cap,
            status: asset.status,
            category_name,
            total_volume,
            created_at: asset.created_at,
        }
    }
}

/// Full asset representation with the category resolved.
#[derive(Serialize, Debug, Clone)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: Asset,
    #[serde(rename = "category")]
    pub category_detail: Option<CategoryView>,
    pub total_volume: Decimal,
    pub transaction_count: i64,
    pub price_updated_ago: Option<f64>,
}

/// Create and partial update payload.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AssetInput {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub asset_type: Option<AssetType>,
    #[serde(default, deserialize_with = "double_option", alias = "category_id")]
    pub category: Option<Option<Uuid>>,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub current_price: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub market_cap: Option<Option<Decimal>>,
    pub risk_level: Option<RiskLevel>,
    #[serde(default, deserialize_with = "double_option")]
    pub beta: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dividend_yield: Option<Option<Decimal>>,
    pub status: Option<AssetStatus>,
    pub exchange: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub isin: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub day_high: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub day_low: Option<Option<Decimal>>,
    pub is_active: Option<bool>,
}

impl AssetInput {
    pub fn into_new(self, now: DateTime<Utc>) -> ApiResult<Asset> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", self.name);
        let symbol = required(&mut errors, "symbol", self.symbol);
        let asset_type = required(&mut errors, "asset_type", self.asset_type);
        let current_price = required(&mut errors, "current_price", self.current_price);
        let (Some(name), Some(symbol), Some(asset_type), Some(current_price)) =
            (name, symbol, asset_type, current_price)
        else {
            return Err(ApiError::Validation(errors));
        };

        let asset = Asset {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            symbol: normalize_symbol(&symbol),
            asset_type,
            category_id: self.category.flatten(),
            description: self.description.unwrap_or_default(),
            company_name: self.company_name.unwrap_or_default(),
            website_url: self.website_url.unwrap_or_default(),
            current_price,
            currency: self
                .currency
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
            market_cap: self.market_cap.flatten(),
            risk_level: self.risk_level.unwrap_or(RiskLevel::Medium),
            beta: self.beta.flatten(),
            dividend_yield: self.dividend_yield.flatten(),
            status: self.status.unwrap_or(AssetStatus::Active),
            exchange: self.exchange.unwrap_or_default(),
            isin: normalize_isin(self.isin.flatten()),
            price_last_updated: Some(now),
            day_high: self.day_high.flatten(),
            day_low: self.day_low.flatten(),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        asset.validate()?;
        Ok(asset)
    }

    pub fn apply(self, asset: &mut Asset, now: DateTime<Utc>) -> ApiResult<()> {
        if let Some(name) = self.name {
            asset.name = name.trim().to_string();
        }
        if let Some(symbol) = self.symbol {
            asset.symbol = normalize_symbol(&symbol);
        }
        if let Some(asset_type) = self.asset_type {
            asset.asset_type = asset_type;
        }
        if let Some(category) = self.category {
            asset.category_id = category;
        }
        if let Some(description) = self.description {
            asset.description = description;
        }
        if let Some(company_name) = self.company_name {
            asset.company_name = company_name;
        }
        if let Some(website_url) = self.website_url {
            asset.website_url = website_url;
        }
        if let Some(price) = self.current_price {
            if price != asset.current_price {
                asset.price_last_updated = Some(now);
            }
            asset.current_price = price;
        }
        if let Some(currency) = self.currency {
            asset.currency = currency.trim().to_uppercase();
        }
        if let Some(market_cap) = self.market_cap {
            asset.market_cap = market_cap;
        }
        if let Some(risk_level) = self.risk_level {
            asset.risk_level = risk_level;
        }
        if let Some(beta) = self.beta {
            asset.beta = beta;
        }
        if let Some(dividend_yield) = self.dividend_yield {
            asset.dividend_yield = dividend_yield;
        }
        if let Some(status) = self.status {
            asset.status = status;
        }
        if let Some(exchange) = self.exchange {
            asset.exchange = exchange;
        }
        if let Some(isin) = self.isin {
            asset.isin = normalize_isin(isin);
        }
        if let Some(day_high) = self.day_high {
            asset.day_high = day_high;
        }
        if let Some(day_low) = self.day_low {
            asset.day_low = day_low;
        }
        if let Some(is_active) = self.is_active {
            asset.is_active = is_active;
        }
        asset.updated_at = now;
        asset.validate()
    }
}

/// Body of the price update action.
#[derive(Deserialize, Debug, Clone)]
pub struct PriceUpdate {
    pub price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub update_high_low: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn apple() -> AssetInput {
        AssetInput {
            name: Some("Apple Inc.".into()),
            symbol: Some(" aapl ".into()),
            asset_type: Some(AssetType::Stock),
            current_price: Some(dec!(150.25)),
            ..Default::default()
        }
    }

    fn field_errors(result: ApiResult<Asset>) -> ValidationErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn create_normalizes_and_defaults() {
        let asset = apple().into_new(Utc::now()).unwrap();
        assert_eq!(asset.symbol, "AAPL");
        assert_eq!(asset.currency, "USD");
        assert_eq!(asset.risk_level, RiskLevel::Medium);
        assert_eq!(asset.status, AssetStatus::Active);
        assert!(asset.price_last_updated.is_some());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let errors = field_errors(AssetInput::default().into_new(Utc::now()));
        for field in ["name", "symbol", "asset_type", "current_price"] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[test]
    fn price_must_be_positive() {
        let mut input = apple();
        input.current_price = Some(Decimal::ZERO);
        assert!(field_errors(input.into_new(Utc::now())).has("current_price"));
    }

    #[test]
    fn day_high_below_day_low_is_rejected() {
        let mut input = apple();
        input.day_high = Some(Some(dec!(100)));
        input.day_low = Some(Some(dec!(120)));
        assert!(field_errors(input.into_new(Utc::now())).has("day_high"));
    }

    #[test]
    fn amounts_are_held_to_column_precision() {
        let mut input = apple();
        input.current_price = Some(dec!(10000000000000));
        input.market_cap = Some(Some(dec!(70000000000000000000000000000)));
        input.beta = Some(Some(dec!(1.2345)));
        input.day_high = Some(Some(dec!(10000000000000)));
        let errors = field_errors(input.into_new(Utc::now()));
        for field in ["current_price", "market_cap", "beta", "day_high"] {
            assert!(errors.has(field), "missing error for {field}");
        }

        let mut input = apple();
        input.market_cap = Some(Some(dec!(999999999999999999.99)));
        input.beta = Some(Some(dec!(-12.5)));
        assert!(input.into_new(Utc::now()).is_ok());
    }

    #[test]
    fn isin_length_and_url_checked() {
        let mut input = apple();
        input.isin = Some(Some("US03783310".into()));
        input.website_url = Some("not a url".into());
        let errors = field_errors(input.into_new(Utc::now()));
        assert!(errors.has("isin"));
        assert!(errors.has("website_url"));

        let mut input = apple();
        input.isin = Some(Some("us0378331005".into()));
        input.website_url = Some("https://www.apple.com".into());
        let asset = input.into_new(Utc::now()).unwrap();
        assert_eq!(asset.isin.as_deref(), Some("US0378331005"));
    }

    #[test]
    fn blank_isin_is_stored_as_none() {
        let mut input = apple();
        input.isin = Some(Some("  ".into()));
        assert!(input.into_new(Utc::now()).unwrap().isin.is_none());
    }

    #[test]
    fn price_update_widens_day_range() {
        let mut asset = apple().into_new(Utc::now()).unwrap();
        asset.apply_price(dec!(151), true, Utc::now());
        assert_eq!(asset.day_high, Some(dec!(151)));
        assert_eq!(asset.day_low, Some(dec!(151)));

        asset.apply_price(dec!(149.5), true, Utc::now());
        assert_eq!(asset.day_high, Some(dec!(151)));
        assert_eq!(asset.day_low, Some(dec!(149.5)));

        asset.apply_price(dec!(160), false, Utc::now());
        assert_eq!(asset.current_price, dec!(160));
        assert_eq!(asset.day_high, Some(dec!(151)));
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let mut asset = apple().into_new(Utc::now()).unwrap();
        let update: AssetInput =
            serde_json::from_str(r#"{"risk_level": "HIGH", "market_cap": "2400000000000"}"#)
                .unwrap();
        update.apply(&mut asset, Utc::now()).unwrap();
        assert_eq!(asset.risk_level, RiskLevel::High);
        assert_eq!(asset.market_cap, Some(dec!(2400000000000)));
        assert_eq!(asset.symbol, "AAPL");
    }

    #[test]
    fn enum_round_trips_through_text() {
        for kind in AssetType::ALL {
            assert_eq!(kind.as_str().parse::<AssetType>().unwrap(), *kind);
        }
        assert!("SHARES".parse::<AssetType>().is_err());
    }
}
