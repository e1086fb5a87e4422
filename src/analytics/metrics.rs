//! Dashboard metrics. Every function folds preloaded facts, so the results
//! only depend on their inputs.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::aggregate::{
    checked_add, checked_sum, safe_div, to_f64, DecimalStats, Overflow, VolumeBreakdown,
};
use super::facts::{AssetFact, TradeFact, UserFact};
use crate::models::{AssetType, RiskLevel, TransactionType};

pub const TOP_ASSETS_LIMIT: usize = 10;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserGrowthPoint {
    pub date: NaiveDate,
    pub new_users: u64,
    pub total_users: u64,
    pub growth_rate: f64,
}

/// One point per calendar day of `[start, end]`, cumulative totals seeded
/// with everyone who joined before `start`.
pub fn user_growth(users: &[UserFact], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<UserGrowthPoint> {
    let mut joined_per_day: HashMap<NaiveDate, u64> = HashMap::new();
    let mut total = 0;
    for user in users {
        if user.date_joined < start {
            total += 1;
        } else if user.date_joined <= end {
            *joined_per_day.entry(user.date_joined.date_naive()).or_default() += 1;
        }
    }

    let mut points = Vec::new();
    let mut day = start.date_naive();
    let last = end.date_naive();
    while day <= last {
        let new_users = joined_per_day.get(&day).copied().unwrap_or_default();
        total += new_users;
        points.push(UserGrowthPoint {
            date: day,
            new_users,
            total_users: total,
            growth_rate: if total > 0 {
                new_users as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        });
        day += Duration::days(1);
    }
    points
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssetDistribution {
    pub asset_type: AssetType,
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_cap_total: Decimal,
}

pub fn asset_distribution(assets: &[AssetFact]) -> Result<Vec<AssetDistribution>, Overflow> {
    let mut groups: BTreeMap<AssetType, (DecimalStats, Decimal)> = BTreeMap::new();
    for asset in assets {
        let (prices, market_cap) = groups.entry(asset.asset_type).or_default();
        prices.push(asset.current_price)?;
        *market_cap = checked_add(*market_cap, asset.market_cap.unwrap_or_default())?;
    }

    let mut rows: Vec<_> = groups
        .into_iter()
        .map(|(asset_type, (prices, market_cap_total))| AssetDistribution {
            asset_type,
            count: prices.count,
            total_value: prices.sum,
            avg_price: prices.mean(),
            market_cap_total,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(rows)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VolumePoint {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub volume: Decimal,
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_transaction_size: Decimal,
}

/// Daily completed volume, only for days that saw trades.
pub fn transaction_volume(trades: &[TradeFact]) -> Result<Vec<VolumePoint>, Overflow> {
    let mut days: BTreeMap<NaiveDate, VolumeBreakdown> = BTreeMap::new();
    for trade in trades {
        days.entry(trade.transaction_date.date_naive())
            .or_default()
            .push(trade.transaction_type, trade.total_amount)?;
    }
    let points = days
        .into_iter()
        .map(|(date, day)| VolumePoint {
            date,
            volume: day.all.sum,
            count: day.all.count,
            buy_volume: day.buy.sum,
            sell_volume: day.sell.sum,
            avg_transaction_size: day.all.mean(),
        })
        .collect();
    Ok(points)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PortfolioPerformance {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_invested: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_returns: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_position: Decimal,
    pub total_transactions: u64,
    pub buy_transactions: u64,
    pub sell_transactions: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_buy_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_sell_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub roi_percentage: Decimal,
}

/// Per-user buy/sell totals over all completed trades. Only active users
/// with at least one trade appear; largest net position first.
pub fn portfolio_performance(
    users: &[UserFact],
    trades: &[TradeFact],
) -> Result<Vec<PortfolioPerformance>, Overflow> {
    let mut per_user: HashMap<Uuid, VolumeBreakdown> = HashMap::new();
    for trade in trades {
        per_user
            .entry(trade.user_id)
            .or_default()
            .push(trade.transaction_type, trade.total_amount)?;
    }

    let mut rows = Vec::new();
    for user in users {
        let Some(volume) = per_user.get(&user.id) else {
            continue;
        };
        rows.push(PortfolioPerformance {
            user_id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            total_invested: volume.buy.sum,
            total_returns: volume.sell.sum,
            net_position: volume.net(),
            total_transactions: volume.all.count,
            buy_transactions: volume.buy.count,
            sell_transactions: volume.sell.count,
            avg_buy_size: volume.buy.mean(),
            avg_sell_size: volume.sell.mean(),
            roi_percentage: roi_percentage(volume)?,
        });
    }
    rows.sort_by(|a, b| {
        b.net_position
            .cmp(&a.net_position)
            .then_with(|| a.username.cmp(&b.username))
    });
    Ok(rows)
}

/// `(sell - buy) / buy x 100`, zero without buys.
fn roi_percentage(volume: &VolumeBreakdown) -> Result<Decimal, Overflow> {
    if volume.buy.sum <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    (volume.sell.sum - volume.buy.sum)
        .checked_div(volume.buy.sum)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or(Overflow)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssetTypePerformance {
    pub asset_type: AssetType,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub transaction_count: u64,
    pub asset_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_market_cap: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_volume_per_asset: Decimal,
}

#[derive(Default)]
struct TypeTotals {
    prices: DecimalStats,
    market_cap: Decimal,
    volume: DecimalStats,
}

/// Asset metrics per type, counting each asset once however often it traded.
/// Types without completed volume are left out.
pub fn asset_type_performance(
    assets: &[AssetFact],
    trades: &[TradeFact],
) -> Result<Vec<AssetTypePerformance>, Overflow> {
    let mut type_of: HashMap<Uuid, AssetType> = HashMap::new();
    let mut groups: BTreeMap<AssetType, TypeTotals> = BTreeMap::new();
    for asset in assets {
        type_of.insert(asset.id, asset.asset_type);
        let totals = groups.entry(asset.asset_type).or_default();
        totals.prices.push(asset.current_price)?;
        totals.market_cap = checked_add(totals.market_cap, asset.market_cap.unwrap_or_default())?;
    }
    for trade in trades {
        if let Some(asset_type) = type_of.get(&trade.asset_id) {
            if let Some(totals) = groups.get_mut(asset_type) {
                totals.volume.push(trade.total_amount)?;
            }
        }
    }

    let mut rows: Vec<_> = groups
        .into_iter()
        .filter(|(_, totals)| !totals.volume.sum.is_zero())
        .map(|(asset_type, totals)| AssetTypePerformance {
            asset_type,
            total_volume: totals.volume.sum,
            avg_price: totals.prices.mean(),
            transaction_count: totals.volume.count,
            asset_count: totals.prices.count,
            total_market_cap: totals.market_cap,
            min_price: totals.prices.min.unwrap_or_default(),
            max_price: totals.prices.max.unwrap_or_default(),
            avg_volume_per_asset: safe_div(totals.volume.sum, Decimal::from(totals.prices.count)),
        })
        .collect();
    rows.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));
    Ok(rows)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TopAsset {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    pub transaction_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_transaction_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub volume_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_cap: Decimal,
    pub risk_level: RiskLevel,
}

pub fn top_assets(
    assets: &[AssetFact],
    trades: &[TradeFact],
    limit: usize,
) -> Result<Vec<TopAsset>, Overflow> {
    let mut per_asset: HashMap<Uuid, VolumeBreakdown> = HashMap::new();
    for trade in trades {
        per_asset
            .entry(trade.asset_id)
            .or_default()
            .push(trade.transaction_type, trade.total_amount)?;
    }

    let mut rows: Vec<_> = assets
        .iter()
        .filter_map(|asset| {
            let volume = per_asset.get(&asset.id)?;
            Some(TopAsset {
                id: asset.id,
                name: asset.name.clone(),
                symbol: asset.symbol.clone(),
                asset_type: asset.asset_type,
                current_price: asset.current_price,
                total_volume: volume.all.sum,
                transaction_count: volume.all.count,
                buy_volume: volume.buy.sum,
                sell_volume: volume.sell.sum,
                avg_transaction_size: volume.all.mean(),
                volume_balance: volume.net(),
                market_cap: asset.market_cap.unwrap_or_default(),
                risk_level: asset.risk_level,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_volume
            .cmp(&a.total_volume)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    rows.truncate(limit);
    Ok(rows)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransactionTrend {
    pub transaction_type: TransactionType,
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    pub unique_users: u64,
    pub unique_assets: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_volume_per_user: Decimal,
}

#[derive(Default)]
struct TrendTotals {
    amounts: DecimalStats,
    quantities: DecimalStats,
    fees: Decimal,
    users: HashSet<Uuid>,
    assets: HashSet<Uuid>,
}

pub fn transaction_trends(trades: &[TradeFact]) -> Result<Vec<TransactionTrend>, Overflow> {
    let mut groups: BTreeMap<TransactionType, TrendTotals> = BTreeMap::new();
    for trade in trades {
        let totals = groups.entry(trade.transaction_type).or_default();
        totals.amounts.push(trade.total_amount)?;
        totals.quantities.push(trade.quantity)?;
        totals.fees = checked_add(totals.fees, trade.fees)?;
        totals.users.insert(trade.user_id);
        totals.assets.insert(trade.asset_id);
    }

    let mut rows: Vec<_> = groups
        .into_iter()
        .map(|(transaction_type, totals)| {
            let unique_users = totals.users.len() as u64;
            TransactionTrend {
                transaction_type,
                count: totals.amounts.count,
                total_volume: totals.amounts.sum,
                avg_amount: totals.amounts.mean(),
                avg_quantity: totals.quantities.mean(),
                total_fees: totals.fees,
                unique_users,
                unique_assets: totals.assets.len() as u64,
                avg_volume_per_user: safe_div(totals.amounts.sum, Decimal::from(unique_users)),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));
    Ok(rows)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceRange {
    #[serde(with = "rust_decimal::serde::float")]
    pub min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssetStatistics {
    pub total_assets: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_market_cap: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    pub price_range: PriceRange,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TradeStatistics {
    pub total_transactions: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_transaction_size: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecentActivity {
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MarketOverview {
    pub asset_statistics: AssetStatistics,
    pub transaction_statistics: TradeStatistics,
    pub recent_activity: RecentActivity,
    pub generated_at: DateTime<Utc>,
}

pub fn market_overview(
    assets: &[AssetFact],
    trades: &[TradeFact],
    now: DateTime<Utc>,
) -> Result<MarketOverview, Overflow> {
    let prices = DecimalStats::collect(assets.iter().map(|asset| asset.current_price))?;
    let total_market_cap = checked_sum(assets.iter().filter_map(|asset| asset.market_cap))?;
    let volume = DecimalStats::collect(trades.iter().map(|trade| trade.total_amount))?;

    let today = now.date_naive();
    let week_ago = today - Duration::days(7);
    let month_ago = today - Duration::days(30);
    let count_since = |first_day: NaiveDate| {
        trades
            .iter()
            .filter(|trade| trade.transaction_date.date_naive() >= first_day)
            .count() as u64
    };

    Ok(MarketOverview {
        asset_statistics: AssetStatistics {
            total_assets: prices.count,
            total_market_cap,
            avg_price: prices.mean(),
            price_range: PriceRange {
                min: prices.min.unwrap_or_default(),
                max: prices.max.unwrap_or_default(),
            },
        },
        transaction_statistics: TradeStatistics {
            total_transactions: volume.count,
            total_volume: volume.sum,
            avg_transaction_size: volume.mean(),
        },
        recent_activity: RecentActivity {
            today: trades
                .iter()
                .filter(|trade| trade.transaction_date.date_naive() == today)
                .count() as u64,
            this_week: count_since(week_ago),
            this_month: count_since(month_ago),
        },
        generated_at: now,
    })
}

/// Asset statistics block of `/assets/{id}/statistics`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TradeSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    pub transaction_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_transaction_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_volume: Decimal,
    pub buy_sell_ratio: Option<f64>,
}

pub fn trade_summary(trades: &[TradeFact]) -> Result<TradeSummary, Overflow> {
    let volume = VolumeBreakdown::collect(
        trades
            .iter()
            .map(|trade| (trade.transaction_type, trade.total_amount)),
    )?;
    Ok(TradeSummary {
        total_volume: volume.all.sum,
        transaction_count: volume.all.count,
        avg_transaction_size: volume.all.mean(),
        buy_volume: volume.buy.sum,
        sell_volume: volume.sell.sum,
        buy_sell_ratio: volume.buy_sell_ratio(),
    })
}

/// Caller block of `/transactions/summary`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserTradeSummary {
    pub total_transactions: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub buy_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sell_volume: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_volume: Decimal,
    pub pending_transactions: u64,
}

pub fn user_trade_summary(
    trades: &[TradeFact],
    pending_transactions: u64,
) -> Result<UserTradeSummary, Overflow> {
    let volume = VolumeBreakdown::collect(
        trades
            .iter()
            .map(|trade| (trade.transaction_type, trade.total_amount)),
    )?;
    Ok(UserTradeSummary {
        total_transactions: volume.all.count,
        total_volume: volume.all.sum,
        buy_volume: volume.buy.sum,
        sell_volume: volume.sell.sum,
        net_volume: volume.net(),
        pending_transactions,
    })
}

/// Sum of completed volume, reported as a float alongside the graphs.
pub fn completed_volume(trades: &[TradeFact]) -> Result<f64, Overflow> {
    checked_sum(trades.iter().map(|trade| trade.total_amount)).map(to_f64)
}
