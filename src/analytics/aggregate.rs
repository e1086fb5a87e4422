use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::models::TransactionType;

/// A running decimal total left the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("decimal aggregate overflowed")]
pub struct Overflow;

impl From<Overflow> for ApiError {
    fn from(err: Overflow) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub fn checked_add(total: Decimal, value: Decimal) -> Result<Decimal, Overflow> {
    total.checked_add(value).ok_or(Overflow)
}

pub fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Result<Decimal, Overflow> {
    values.into_iter().try_fold(Decimal::ZERO, checked_add)
}

/// Running count / sum / min / max over exact decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecimalStats {
    pub count: u64,
    pub sum: Decimal,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl DecimalStats {
    pub fn push(&mut self, value: Decimal) -> Result<(), Overflow> {
        self.sum = checked_add(self.sum, value)?;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        Ok(())
    }

    pub fn collect<I: IntoIterator<Item = Decimal>>(values: I) -> Result<Self, Overflow> {
        let mut stats = DecimalStats::default();
        for value in values {
            stats.push(value)?;
        }
        Ok(stats)
    }

    /// Arithmetic mean, zero for an empty set.
    pub fn mean(&self) -> Decimal {
        if self.count == 0 {
            Decimal::ZERO
        } else {
            self.sum / Decimal::from(self.count)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// `numerator / denominator`, or zero when the denominator is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Volume split by trade direction; the shape shared by the asset
/// statistics and the caller's transaction summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeBreakdown {
    pub all: DecimalStats,
    pub buy: DecimalStats,
    pub sell: DecimalStats,
}

impl VolumeBreakdown {
    pub fn push(&mut self, kind: TransactionType, amount: Decimal) -> Result<(), Overflow> {
        self.all.push(amount)?;
        match kind {
            TransactionType::Buy => self.buy.push(amount),
            TransactionType::Sell => self.sell.push(amount),
            _ => Ok(()),
        }
    }

    pub fn collect<I>(trades: I) -> Result<Self, Overflow>
    where
        I: IntoIterator<Item = (TransactionType, Decimal)>,
    {
        let mut breakdown = VolumeBreakdown::default();
        for (kind, amount) in trades {
            breakdown.push(kind, amount)?;
        }
        Ok(breakdown)
    }

    pub fn net(&self) -> Decimal {
        self.buy.sum - self.sell.sum
    }

    /// Buy volume over sell volume; undefined without sells.
    pub fn buy_sell_ratio(&self) -> Option<f64> {
        if self.sell.sum > Decimal::ZERO {
            let ratio = match self.buy.sum.checked_div(self.sell.sum) {
                Some(ratio) => to_f64(ratio),
                None => to_f64(self.buy.sum) / to_f64(self.sell.sum),
            };
            Some(ratio)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stats_track_extremes_and_mean() {
        let stats = DecimalStats::collect([dec!(10), dec!(2.5), dec!(7.5)]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, dec!(20));
        assert_eq!(stats.min, Some(dec!(2.5)));
        assert_eq!(stats.max, Some(dec!(10)));
        assert_eq!(stats.mean().round_dp(4), dec!(6.6667));
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = DecimalStats::default();
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), Decimal::ZERO);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn breakdown_splits_by_direction() {
        let breakdown = VolumeBreakdown::collect([
            (TransactionType::Buy, dec!(300)),
            (TransactionType::Sell, dec!(100)),
            (TransactionType::Dividend, dec!(5)),
            (TransactionType::Buy, dec!(100)),
        ])
        .unwrap();
        assert_eq!(breakdown.all.sum, dec!(505));
        assert_eq!(breakdown.all.count, 4);
        assert_eq!(breakdown.buy.sum, dec!(400));
        assert_eq!(breakdown.sell.sum, dec!(100));
        assert_eq!(breakdown.net(), dec!(300));
        assert_eq!(breakdown.buy_sell_ratio(), Some(4.0));
    }

    #[test]
    fn ratio_undefined_without_sells() {
        let breakdown = VolumeBreakdown::collect([(TransactionType::Buy, dec!(10))]).unwrap();
        assert_eq!(breakdown.buy_sell_ratio(), None);
        assert_eq!(safe_div(dec!(1), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn overflowing_sums_are_errors() {
        let mut stats = DecimalStats::default();
        stats.push(dec!(70000000000000000000000000000)).unwrap();
        assert_eq!(stats.push(dec!(70000000000000000000000000000)), Err(Overflow));
        assert_eq!(stats.count, 1);
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), Err(Overflow));
        assert_eq!(checked_sum([dec!(1.5), dec!(2)]), Ok(dec!(3.5)));
        assert!(matches!(ApiError::from(Overflow), ApiError::Internal(_)));
    }
}
