use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{categories, order_by, Conditions};
use crate::analytics::aggregate::checked_add;
use crate::db::{decimal_column, is_unique_violation, opt_decimal_column, opt_uuid_column, uuid_column};
use crate::error::{ApiError, ApiResult};
use crate::models::{Asset, AssetDetail, AssetListItem, AssetStatus, AssetType, RiskLevel};

const COLUMNS: &str = "a.id, a.name, a.symbol, a.asset_type, a.category_id, a.description, \
    a.company_name, a.website_url, a.current_price, a.currency, a.market_cap, a.risk_level, \
    a.beta, a.dividend_yield, a.status, a.exchange, a.isin, a.price_last_updated, a.day_high, \
    a.day_low, a.is_active, a.created_at, a.updated_at";

const ORDERING: &[(&str, &str)] = &[
    ("name", "a.name"),
    ("symbol", "a.symbol"),
    ("current_price", "CAST(a.current_price AS REAL)"),
    ("market_cap", "CAST(a.market_cap AS REAL)"),
    ("created_at", "a.created_at"),
];

#[derive(Debug, Default, Clone)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
    pub category: Option<Uuid>,
    pub risk_level: Option<RiskLevel>,
    pub currency: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl AssetFilter {
    fn price_in_range(&self, price: Decimal) -> bool {
        self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
    }
}

pub(crate) fn map_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: uuid_column(row, "id")?,
        name: row.get("name")?,
        symbol: row.get("symbol")?,
        asset_type: row.get("asset_type")?,
        category_id: opt_uuid_column(row, "category_id")?,
        description: row.get("description")?,
        company_name: row.get("company_name")?,
        website_url: row.get("website_url")?,
        current_price: decimal_column(row, "current_price")?,
        currency: row.get("currency")?,
        market_cap: opt_decimal_column(row, "market_cap")?,
        risk_level: row.get("risk_level")?,
        beta: opt_decimal_column(row, "beta")?,
        dividend_yield: opt_decimal_column(row, "dividend_yield")?,
        status: row.get("status")?,
        exchange: row.get("exchange")?,
        isin: row.get("isin")?,
        price_last_updated: row.get("price_last_updated")?,
        day_high: opt_decimal_column(row, "day_high")?,
        day_low: opt_decimal_column(row, "day_low")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn unique_fields(e: rusqlite::Error) -> ApiError {
    if is_unique_violation(&e, "assets", "symbol") {
        ApiError::field("symbol", "Asset with this symbol already exists.")
    } else if is_unique_violation(&e, "assets", "isin") {
        ApiError::field("isin", "Asset with this ISIN already exists.")
    } else {
        e.into()
    }
}

fn text(value: Option<Decimal>) -> Option<String> {
    value.map(|v| v.to_string())
}

pub fn insert(conn: &Connection, asset: &Asset) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO assets (id, name, symbol, asset_type, category_id, description, company_name,
             website_url, current_price, currency, market_cap, risk_level, beta, dividend_yield,
             status, exchange, isin, price_last_updated, day_high, day_low, is_active,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21, ?22, ?23)",
        params![
            asset.id.to_string(),
            asset.name,
            asset.symbol,
            asset.asset_type,
            asset.category_id.map(|id| id.to_string()),
            asset.description,
            asset.company_name,
            asset.website_url,
            asset.current_price.to_string(),
            asset.currency,
            text(asset.market_cap),
            asset.risk_level,
            text(asset.beta),
            text(asset.dividend_yield),
            asset.status,
            asset.exchange,
            asset.isin,
            asset.price_last_updated,
            text(asset.day_high),
            text(asset.day_low),
            asset.is_active,
            asset.created_at,
            asset.updated_at,
        ],
    )
    .map_err(unique_fields)?;
    Ok(())
}

pub fn update(conn: &Connection, asset: &Asset) -> ApiResult<()> {
    let changed = conn
        .execute(
            "UPDATE assets SET name = ?2, symbol = ?3, asset_type = ?4, category_id = ?5,
                 description = ?6, company_name = ?7, website_url = ?8, current_price = ?9,
                 currency = ?10, market_cap = ?11, risk_level = ?12, beta = ?13,
                 dividend_yield = ?14, status = ?15, exchange = ?16, isin = ?17,
                 price_last_updated = ?18, day_high = ?19, day_low = ?20, is_active = ?21,
                 updated_at = ?22
             WHERE id = ?1",
            params![
                asset.id.to_string(),
                asset.name,
                asset.symbol,
                asset.asset_type,
                asset.category_id.map(|id| id.to_string()),
                asset.description,
                asset.company_name,
                asset.website_url,
                asset.current_price.to_string(),
                asset.currency,
                text(asset.market_cap),
                asset.risk_level,
                text(asset.beta),
                text(asset.dividend_yield),
                asset.status,
                asset.exchange,
                asset.isin,
                asset.price_last_updated,
                text(asset.day_high),
                text(asset.day_low),
                asset.is_active,
                asset.updated_at,
            ],
        )
        .map_err(unique_fields)?;
    if changed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> ApiResult<Option<Asset>> {
    let asset = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM assets a WHERE a.id = ?1"),
            [id.to_string()],
            map_asset,
        )
        .optional()?;
    Ok(asset)
}

pub fn find_active(conn: &Connection, id: Uuid) -> ApiResult<Asset> {
    get(conn, id)?
        .filter(|asset| asset.is_active)
        .ok_or(ApiError::NotFound)
}

pub fn delete(conn: &Connection, id: Uuid) -> ApiResult<()> {
    let removed = conn.execute("DELETE FROM assets WHERE id = ?1", [id.to_string()])?;
    if removed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

/// A referenced category has to exist and be active.
pub fn check_category(conn: &Connection, category: Option<Uuid>) -> ApiResult<()> {
    let Some(id) = category else {
        return Ok(());
    };
    match categories::get(conn, id)? {
        Some(found) if found.is_active => Ok(()),
        _ => Err(ApiError::field(
            "category",
            format!("Invalid pk \"{id}\" - object does not exist."),
        )),
    }
}

/// Completed volume and completed trade count for one asset.
pub fn completed_volume(conn: &Connection, asset_id: Uuid) -> ApiResult<(Decimal, i64)> {
    let mut stmt = conn.prepare(
        "SELECT total_amount FROM transactions
         WHERE asset_id = ?1 AND status = 'COMPLETED' AND is_active = 1",
    )?;
    let mut total = Decimal::ZERO;
    let mut count = 0;
    let mut rows = stmt.query([asset_id.to_string()])?;
    while let Some(row) = rows.next()? {
        total = checked_add(total, decimal_column(row, "total_amount")?)?;
        count += 1;
    }
    Ok((total, count))
}

/// Completed volume keyed by asset, for every asset that has any.
pub fn completed_volumes(conn: &Connection) -> ApiResult<HashMap<Uuid, Decimal>> {
    let mut stmt = conn.prepare(
        "SELECT asset_id, total_amount FROM transactions
         WHERE status = 'COMPLETED' AND is_active = 1",
    )?;
    let mut volumes: HashMap<Uuid, Decimal> = HashMap::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let asset_id = uuid_column(row, "asset_id")?;
        let volume = volumes.entry(asset_id).or_default();
        *volume = checked_add(*volume, decimal_column(row, "total_amount")?)?;
    }
    Ok(volumes)
}

pub fn list(conn: &Connection, filter: &AssetFilter) -> ApiResult<Vec<AssetListItem>> {
    let mut conditions = Conditions::new();
    conditions.push_raw("a.is_active = 1");
    if let Some(asset_type) = filter.asset_type {
        conditions.push("a.asset_type = ?", asset_type.as_str().to_string());
    }
    if let Some(status) = filter.status {
        conditions.push("a.status = ?", status.as_str().to_string());
    }
    if let Some(category) = filter.category {
        conditions.push("a.category_id = ?", category.to_string());
    }
    if let Some(risk_level) = filter.risk_level {
        conditions.push("a.risk_level = ?", risk_level.as_str().to_string());
    }
    if let Some(currency) = &filter.currency {
        conditions.push("a.currency = ?", currency.trim().to_uppercase());
    }
    if let Some(term) = &filter.search {
        conditions.push_search(&["a.name", "a.symbol", "a.description", "a.company_name"], term);
    }

    let sql = format!(
        "SELECT {COLUMNS}, c.name AS category_name
         FROM assets a LEFT JOIN asset_categories c ON c.id = a.category_id{}{}",
        conditions.sql(),
        order_by(filter.ordering.as_deref(), ORDERING, "a.created_at DESC"),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.into_values()), |row| {
            Ok((map_asset(row)?, row.get::<_, Option<String>>("category_name")?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let volumes = completed_volumes(conn)?;
    Ok(rows
        .into_iter()
        .filter(|(asset, _)| filter.price_in_range(asset.current_price))
        .map(|(asset, category_name)| {
            let volume = volumes.get(&asset.id).copied().unwrap_or_default();
            AssetListItem::new(&asset, category_name, volume)
        })
        .collect())
}

pub fn list_item(conn: &Connection, asset: &Asset) -> ApiResult<AssetListItem> {
    let category_name = match asset.category_id {
        Some(id) => categories::get(conn, id)?.map(|category| category.name),
        None => None,
    };
    let (volume, _) = completed_volume(conn, asset.id)?;
    Ok(AssetListItem::new(asset, category_name, volume))
}

pub fn detail(conn: &Connection, asset: Asset, now: DateTime<Utc>) -> ApiResult<AssetDetail> {
    let category_detail = match asset.category_id {
        Some(id) => match categories::get(conn, id)? {
            Some(category) => Some(categories::view(conn, category)?),
            None => None,
        },
        None => None,
    };
    let (total_volume, transaction_count) = completed_volume(conn, asset.id)?;
    Ok(AssetDetail {
        price_updated_ago: asset.price_updated_ago(now),
        asset,
        category_detail,
        total_volume,
        transaction_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::models::{AssetInput, CategoryInput};
    use rust_decimal_macros::dec;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn create(conn: &Connection, symbol: &str, asset_type: AssetType, price: Decimal) -> Asset {
        let asset = AssetInput {
            name: Some(format!("{symbol} Corp")),
            symbol: Some(symbol.into()),
            asset_type: Some(asset_type),
            current_price: Some(price),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        insert(conn, &asset).unwrap();
        asset
    }

    #[test]
    fn round_trips_every_column() {
        let conn = conn();
        let mut asset = create(&conn, "AAPL", AssetType::Stock, dec!(150.25));
        asset.market_cap = Some(dec!(2400000000000));
        asset.beta = Some(dec!(1.2));
        asset.isin = Some("US0378331005".into());
        update(&conn, &asset).unwrap();
        assert_eq!(get(&conn, asset.id).unwrap(), Some(asset));
    }

    #[test]
    fn duplicate_symbol_is_a_field_error() {
        let conn = conn();
        create(&conn, "AAPL", AssetType::Stock, dec!(150));
        let clone = AssetInput {
            name: Some("Apple again".into()),
            symbol: Some("aapl".into()),
            asset_type: Some(AssetType::Stock),
            current_price: Some(dec!(1)),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        match insert(&conn, &clone) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("symbol")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn list_filters_by_type_price_and_search() {
        let conn = conn();
        create(&conn, "AAPL", AssetType::Stock, dec!(150));
        create(&conn, "MSFT", AssetType::Stock, dec!(300));
        create(&conn, "BTC", AssetType::Crypto, dec!(40000));

        let stocks = list(
            &conn,
            &AssetFilter {
                asset_type: Some(AssetType::Stock),
                ordering: Some("-current_price".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let symbols: Vec<_> = stocks.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, ["MSFT", "AAPL"]);

        let cheap = list(
            &conn,
            &AssetFilter {
                max_price: Some(dec!(1000)),
                min_price: Some(dec!(200)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].symbol, "MSFT");

        let found = list(
            &conn,
            &AssetFilter {
                search: Some("btc".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn category_delete_detaches_assets() {
        let conn = conn();
        let category = CategoryInput {
            name: Some("Tech".into()),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        categories::insert(&conn, &category).unwrap();

        let mut asset = create(&conn, "NVDA", AssetType::Stock, dec!(900));
        asset.category_id = Some(category.id);
        check_category(&conn, asset.category_id).unwrap();
        update(&conn, &asset).unwrap();
        assert_eq!(list(&conn, &AssetFilter::default()).unwrap()[0].category_name.as_deref(), Some("Tech"));

        categories::delete(&conn, category.id).unwrap();
        assert_eq!(get(&conn, asset.id).unwrap().unwrap().category_id, None);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let conn = conn();
        assert!(matches!(
            check_category(&conn, Some(Uuid::new_v4())),
            Err(ApiError::Validation(_))
        ));
        assert!(check_category(&conn, None).is_ok());
    }
}
