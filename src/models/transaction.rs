use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_max_digits, check_max_len, double_option, required};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::models::{AssetListItem, UserSummary};

db_enum! {
    pub enum TransactionType ("transaction type") {
        Buy => "BUY",
        Sell => "SELL",
        TransferIn => "TRANSFER_IN",
        TransferOut => "TRANSFER_OUT",
        Dividend => "DIVIDEND",
        Split => "SPLIT",
        Merge => "MERGE",
        SpinOff => "SPIN_OFF",
        Rights => "RIGHTS",
        Bonus => "BONUS",
    }
}

db_enum! {
    pub enum TransactionStatus ("transaction status") {
        Pending => "PENDING",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
        PartiallyFilled => "PARTIALLY_FILLED",
    }
}

db_enum! {
    pub enum OrderType ("order type") {
        Market => "MARKET",
        Limit => "LIMIT",
        Stop => "STOP",
        StopLimit => "STOP_LIMIT",
    }
}

impl OrderType {
    pub fn needs_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn needs_stop_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

/// Gross value plus fees and tax, kept at cent precision. `None` when the
/// amount leaves the decimal range.
pub fn compute_total(
    quantity: Decimal,
    price_per_unit: Decimal,
    fees: Decimal,
    tax: Decimal,
) -> Option<Decimal> {
    quantity
        .checked_mul(price_per_unit)?
        .checked_add(fees)?
        .checked_add(tax)
        .map(|total| total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub total_amount: Decimal,
    pub fees: Decimal,
    pub tax: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub status: TransactionStatus,
    pub transaction_date: DateTime<Utc>,
    pub settlement_date: Option<NaiveDate>,
    pub notes: String,
    pub external_id: String,
    pub broker: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Checks every field rule against the wall clock `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();

        if self.quantity <= Decimal::ZERO {
            errors.add("quantity", "Quantity must be greater than zero");
        } else {
            check_max_digits(&mut errors, "quantity", self.quantity, 15, 8);
        }
        if self.price_per_unit <= Decimal::ZERO {
            errors.add("price_per_unit", "Price per unit must be greater than zero");
        } else {
            check_max_digits(&mut errors, "price_per_unit", self.price_per_unit, 15, 2);
        }
        for (field, value) in [("fees", self.fees), ("tax", self.tax)] {
            if value < Decimal::ZERO {
                errors.add(field, "Ensure this value is greater than or equal to 0.");
            } else {
                check_max_digits(&mut errors, field, value, 10, 2);
            }
        }

        match self.limit_price {
            None if self.order_type.needs_limit_price() => {
                errors.add("limit_price", "Limit price is required for limit orders")
            }
            Some(price) if price <= Decimal::ZERO => {
                errors.add("limit_price", "Limit price must be greater than zero")
            }
            Some(price) => check_max_digits(&mut errors, "limit_price", price, 15, 2),
            _ => {}
        }
        match self.stop_price {
            None if self.order_type.needs_stop_price() => {
                errors.add("stop_price", "Stop price is required for stop orders")
            }
            Some(price) if price <= Decimal::ZERO => {
                errors.add("stop_price", "Stop price must be greater than zero")
            }
            Some(price) => check_max_digits(&mut errors, "stop_price", price, 15, 2),
            _ => {}
        }

        if self.transaction_date > now {
            errors.add("transaction_date", "Transaction date cannot be in the future");
        }
        check_max_len(&mut errors, "external_id", &self.external_id, 100);
        check_max_len(&mut errors, "broker", &self.broker, 100);

        errors.into_result()
    }

    /// Fails with a `total_amount` field error when the total does not fit its column.
    pub fn recompute_total(&mut self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        match compute_total(self.quantity, self.price_per_unit, self.fees, self.tax) {
            Some(total) => {
                check_max_digits(&mut errors, "total_amount", total, 20, 2);
                if errors.is_empty() {
                    self.total_amount = total;
                }
            }
            None => errors.add("total_amount", "Total amount is too large."),
        }
        errors.into_result()
    }

    /// What actually changed hands: buys carry their costs, other kinds net them out.
    pub fn net_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Buy => self.total_amount,
            _ => self.total_amount - self.fees - self.tax,
        }
    }

    /// Unrealized result of a buy at `current_price`; undefined for every other kind.
    pub fn profit_loss(&self, current_price: Decimal) -> Option<Decimal> {
        match self.transaction_type {
            TransactionType::Buy => self
                .quantity
                .checked_mul(current_price)?
                .checked_sub(self.total_amount),
            _ => None,
        }
    }
}

/// Row of the transaction list, with the joined asset and owner names.
#[derive(Serialize, Debug, Clone)]
pub struct TransactionListItem {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub asset_name: String,
    pub asset_symbol: String,
    pub user_username: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub total_amount: Decimal,
    pub net_amount: Decimal,
    pub status: TransactionStatus,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub asset: AssetListItem,
    pub user: UserSummary,
    pub net_amount: Decimal,
    pub profit_loss: Option<Decimal>,
}

/// Create and partial update payload. The owner always comes from the caller.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TransactionInput {
    #[serde(alias = "asset_id")]
    pub asset: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub order_type: Option<OrderType>,
    #[serde(default, deserialize_with = "double_option")]
    pub limit_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub stop_price: Option<Option<Decimal>>,
    pub status: Option<TransactionStatus>,
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub settlement_date: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
    pub external_id: Option<String>,
    pub broker: Option<String>,
    pub is_active: Option<bool>,
}

impl TransactionInput {
    pub fn into_new(self, user_id: Uuid, now: DateTime<Utc>) -> ApiResult<Transaction> {
        let mut errors = ValidationErrors::new();
        let asset = required(&mut errors, "asset", self.asset);
        let transaction_type = required(&mut errors, "transaction_type", self.transaction_type);
        let quantity = required(&mut errors, "quantity", self.quantity);
        let price_per_unit = required(&mut errors, "price_per_unit", self.price_per_unit);
        let (Some(asset_id), Some(transaction_type), Some(quantity), Some(price_per_unit)) =
            (asset, transaction_type, quantity, price_per_unit)
        else {
            return Err(ApiError::Validation(errors));
        };

        let mut transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            asset_id,
            transaction_type,
            quantity,
            price_per_unit,
            total_amount: Decimal::ZERO,
            fees: self.fees.unwrap_or(Decimal::ZERO),
            tax: self.tax.unwrap_or(Decimal::ZERO),
            order_type: self.order_type.unwrap_or(OrderType::Market),
            limit_price: self.limit_price.flatten(),
            stop_price: self.stop_price.flatten(),
            status: self.status.unwrap_or(TransactionStatus::Pending),
            transaction_date: self.transaction_date.unwrap_or(now),
            settlement_date: self.settlement_date.flatten(),
            notes: self.notes.unwrap_or_default(),
            external_id: self.external_id.unwrap_or_default(),
            broker: self.broker.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        transaction.validate(now)?;
        transaction.recompute_total()?;
        Ok(transaction)
    }

    pub fn apply(self, transaction: &mut Transaction, now: DateTime<Utc>) -> ApiResult<()> {
        if let Some(asset_id) = self.asset {
            transaction.asset_id = asset_id;
        }
        if let Some(kind) = self.transaction_type {
            transaction.transaction_type = kind;
        }
        if let Some(quantity) = self.quantity {
            transaction.quantity = quantity;
        }
        if let Some(price) = self.price_per_unit {
            transaction.price_per_unit = price;
        }
        if let Some(fees) = self.fees {
            transaction.fees = fees;
        }
        if let Some(tax) = self.tax {
            transaction.tax = tax;
        }
        if let Some(order_type) = self.order_type {
            transaction.order_type = order_type;
        }
        if let Some(limit_price) = self.limit_price {
            transaction.limit_price = limit_price;
        }
        if let Some(stop_price) = self.stop_price {
            transaction.stop_price = stop_price;
        }
        if let Some(status) = self.status {
            transaction.status = status;
        }
        if let Some(date) = self.transaction_date {
            transaction.transaction_date = date;
        }
        if let Some(settlement_date) = self.settlement_date {
            transaction.settlement_date = settlement_date;
        }
        if let Some(notes) = self.notes {
            transaction.notes = notes;
        }
        if let Some(external_id) = self.external_id {
            transaction.external_id = external_id;
        }
        if let Some(broker) = self.broker {
            transaction.broker = broker;
        }
        if let Some(is_active) = self.is_active {
            transaction.is_active = is_active;
        }
        transaction.validate(now)?;
        transaction.recompute_total()?;
        transaction.updated_at = now;
        Ok(())
    }
}
