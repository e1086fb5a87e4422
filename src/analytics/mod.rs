//! Dashboard aggregates over assets, users and completed transactions.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use facts::TradeScope;
use metrics::{
    AssetDistribution, AssetTypePerformance, PortfolioPerformance, TopAsset, TransactionTrend,
    UserGrowthPoint, VolumePoint,
};

pub mod aggregate;
pub mod facts;
pub mod metrics;

pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    UserGrowth,
    AssetDistribution,
    TransactionVolume,
    PortfolioPerformance,
    AssetTypePerformance,
    TopAssets,
    TransactionTrends,
}

impl GraphKind {
    pub const ALL: [GraphKind; 7] = [
        GraphKind::UserGrowth,
        GraphKind::AssetDistribution,
        GraphKind::TransactionVolume,
        GraphKind::PortfolioPerformance,
        GraphKind::AssetTypePerformance,
        GraphKind::TopAssets,
        GraphKind::TransactionTrends,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GraphKind::UserGrowth => "user_growth",
            GraphKind::AssetDistribution => "asset_distribution",
            GraphKind::TransactionVolume => "transaction_volume",
            GraphKind::PortfolioPerformance => "portfolio_performance",
            GraphKind::AssetTypePerformance => "asset_type_performance",
            GraphKind::TopAssets => "top_assets",
            GraphKind::TransactionTrends => "transaction_trends",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GraphKind::UserGrowth => "User Growth",
            GraphKind::AssetDistribution => "Asset Distribution",
            GraphKind::TransactionVolume => "Transaction Volume",
            GraphKind::PortfolioPerformance => "Portfolio Performance",
            GraphKind::AssetTypePerformance => "Asset Type Performance",
            GraphKind::TopAssets => "Top Assets",
            GraphKind::TransactionTrends => "Transaction Trends",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GraphKind::UserGrowth => "User registration trends over time",
            GraphKind::AssetDistribution => "Distribution of assets by type and value",
            GraphKind::TransactionVolume => "Transaction volume and frequency over time",
            GraphKind::PortfolioPerformance => "Individual user portfolio performance metrics",
            GraphKind::AssetTypePerformance => "Performance metrics grouped by asset type",
            GraphKind::TopAssets => "Most actively traded assets by volume",
            GraphKind::TransactionTrends => "Transaction patterns and trends by type",
        }
    }
}

impl FromStr for GraphKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GraphKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown graph type: {s}")))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GraphInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn available_graphs() -> Vec<GraphInfo> {
    GraphKind::ALL
        .into_iter()
        .map(|kind| GraphInfo {
            key: kind.key(),
            name: kind.name(),
            description: kind.description(),
        })
        .collect()
}

/// The trailing `days` ending at `end`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DateWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days: i64,
}

impl DateWindow {
    pub fn ending_at(end: DateTime<Utc>, days: i64) -> ApiResult<Self> {
        if !(1..=MAX_DAYS).contains(&days) {
            return Err(ApiError::BadRequest(format!(
                "Days parameter must be between 1 and {MAX_DAYS}"
            )));
        }
        Ok(DateWindow {
            start_date: end - Duration::days(days),
            end_date: end,
            days,
        })
    }

    /// Parses the raw `days` query value; absent means the default window.
    pub fn parse(end: DateTime<Utc>, raw: Option<&str>) -> ApiResult<Self> {
        let days = match raw {
            None => DEFAULT_DAYS,
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest("Invalid parameters provided".to_string()))?,
        };
        Self::ending_at(end, days)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_users: u64,
    pub total_assets: u64,
    pub total_transactions: i64,
    pub total_volume: f64,
    pub date_range: DateWindow,
}

/// Payload of `/analytics/graphs`: the requested graphs plus the summary.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Dashboard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_growth: Option<Vec<UserGrowthPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_distribution: Option<Vec<AssetDistribution>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_volume: Option<Vec<VolumePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_performance: Option<Vec<PortfolioPerformance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type_performance: Option<Vec<AssetTypePerformance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_assets: Option<Vec<TopAsset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_trends: Option<Vec<TransactionTrend>>,
    pub summary: DashboardSummary,
}

/// Builds one graph, or all of them when `only` is `None`.
pub fn dashboard(conn: &Connection, window: DateWindow, only: Option<GraphKind>) -> ApiResult<Dashboard> {
    let wants = |kind: GraphKind| only.map_or(true, |requested| requested == kind);

    let users = facts::active_users(conn)?;
    let assets = facts::active_assets(conn)?;
    let all_trades = facts::completed_trades(conn, TradeScope::All)?;
    let window_trades =
        facts::completed_trades(conn, TradeScope::Between(window.start_date, window.end_date))?;

    let summary = DashboardSummary {
        total_users: users.len() as u64,
        total_assets: assets.len() as u64,
        total_transactions: facts::active_transaction_count(conn)?,
        total_volume: metrics::completed_volume(&all_trades)?,
        date_range: window,
    };

    Ok(Dashboard {
        user_growth: wants(GraphKind::UserGrowth)
            .then(|| metrics::user_growth(&users, window.start_date, window.end_date)),
        asset_distribution: wants(GraphKind::AssetDistribution)
            .then(|| metrics::asset_distribution(&assets))
            .transpose()?,
        transaction_volume: wants(GraphKind::TransactionVolume)
            .then(|| metrics::transaction_volume(&window_trades))
            .transpose()?,
        portfolio_performance: wants(GraphKind::PortfolioPerformance)
            .then(|| metrics::portfolio_performance(&users, &all_trades))
            .transpose()?,
        asset_type_performance: wants(GraphKind::AssetTypePerformance)
            .then(|| metrics::asset_type_performance(&assets, &all_trades))
            .transpose()?,
        top_assets: wants(GraphKind::TopAssets)
            .then(|| metrics::top_assets(&assets, &all_trades, metrics::TOP_ASSETS_LIMIT))
            .transpose()?,
        transaction_trends: wants(GraphKind::TransactionTrends)
            .then(|| metrics::transaction_trends(&window_trades))
            .transpose()?,
        summary,
    })
}

pub fn market_overview(conn: &Connection, now: DateTime<Utc>) -> ApiResult<metrics::MarketOverview> {
    let assets = facts::active_assets(conn)?;
    let trades = facts::completed_trades(conn, TradeScope::All)?;
    Ok(metrics::market_overview(&assets, &trades, now)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_keys_parse_back() {
        for kind in GraphKind::ALL {
            assert_eq!(kind.key().parse::<GraphKind>().unwrap(), kind);
        }
        assert!(matches!(
            "pie_chart".parse::<GraphKind>(),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(available_graphs().len(), 7);
    }

    #[test]
    fn window_bounds() {
        let now = Utc::now();
        assert_eq!(DateWindow::parse(now, None).unwrap().days, DEFAULT_DAYS);
        let week = DateWindow::parse(now, Some("7")).unwrap();
        assert_eq!(week.end_date - week.start_date, Duration::days(7));
        assert!(DateWindow::parse(now, Some("365")).is_ok());
        for bad in ["0", "366", "-3", "abc", "1.5"] {
            assert!(
                matches!(DateWindow::parse(now, Some(bad)), Err(ApiError::BadRequest(_))),
                "{bad} accepted"
            );
        }
    }
}
