//! CoinMarketCap DEX response parsers.
//!
//! - `spot-pairs/latest` → [`DexPair`] list + scroll cursor
//! - `networks/list` → `(name, slug)` list
//! - `cryptocurrency/info` → asset id → logo URL
//!
//! Pair quote fields appear either at the top level or inside `quote[0]`,
//! depending on the API revision; both are read.

use ahash::AHashMap;
use movers_core::{ChangeSet, MoversError, RawEntity};
use serde_json::Value;

use crate::json_util::{parse_f64_any, parse_str_u64, str_field};

/// One DEX pool with the fields the quality filters need.
#[derive(Debug, Clone)]
pub struct DexPair {
    pub entity: RawEntity,
    /// Fully diluted value, falling back to market cap.
    pub fdv: Option<f64>,
}

/// A parsed `spot-pairs/latest` page.
#[derive(Debug, Clone)]
pub struct PairsPage {
    pub pairs: Vec<DexPair>,
    pub scroll_id: Option<String>,
}

fn quote_f64(v: &Value, keys: &[&str]) -> Option<f64> {
    parse_f64_any(v, keys).or_else(|| {
        v.get("quote")
            .and_then(Value::as_array)
            .and_then(|q| q.first())
            .and_then(|q| parse_f64_any(q, keys))
    })
}

fn data_array<'a>(body: &'a Value, label: &str) -> Result<&'a [Value], MoversError> {
    match body.get("data") {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Ok(&[]),
        Some(_) => Err(MoversError::Decode(format!("{label}: `data` is not an array"))),
    }
}

/// Parse one `spot-pairs/latest` page.
pub fn parse_pairs(body: &Value) -> Result<PairsPage, MoversError> {
    let pairs = data_array(body, "cmc pairs")?.iter().filter_map(parse_pair).collect();
    let scroll_id = body
        .pointer("/status/scroll_id")
        .or_else(|| body.get("scroll_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(PairsPage { pairs, scroll_id })
}

fn parse_pair(v: &Value) -> Option<DexPair> {
    let symbol = str_field(v, "base_asset_symbol")?;
    let contract = str_field(v, "base_asset_contract_address");
    let id = str_field(v, "contract_address")
        .or_else(|| contract.clone())
        .unwrap_or_else(|| symbol.clone());
    let platform = v
        .get("platform")
        .and_then(|p| str_field(p, "name"))
        .or_else(|| str_field(v, "network_slug"))
        .unwrap_or_else(|| "Unknown".to_string());

    let entity = RawEntity {
        id,
        name: str_field(v, "base_asset_name").unwrap_or_else(|| symbol.clone()),
        symbol,
        image: None,
        price: quote_f64(v, &["price"]),
        market_cap: None,
        liquidity: quote_f64(v, &["liquidity"]),
        volume_24h: quote_f64(v, &["volume_24h"]),
        changes: ChangeSet {
            h1: quote_f64(v, &["percent_change_price_1h", "percent_change_1h"]),
            h24: quote_f64(v, &["percent_change_24h", "percent_change_price_24h"]),
            ..Default::default()
        },
        platform: Some(platform),
        contract,
        dex_url: str_field(v, "dex_url"),
        asset_id: parse_str_u64(v.get("base_asset_id")),
    };
    Some(DexPair {
        entity,
        fdv: quote_f64(v, &["fully_diluted_value", "market_cap"]),
    })
}

/// Parse `networks/list` into `(lower-cased name, slug)` pairs.
pub fn parse_networks(body: &Value) -> Result<Vec<(String, String)>, MoversError> {
    Ok(data_array(body, "cmc networks")?
        .iter()
        .filter_map(|n| {
            let name = str_field(n, "name")?.to_lowercase();
            let slug = str_field(n, "network_slug").or_else(|| str_field(n, "slug"))?;
            Some((name, slug))
        })
        .collect())
}

/// Parse `cryptocurrency/info` into an id → logo map.
///
/// `data` is keyed by id; each value is an object, or a list of objects for
/// symbol lookups.
pub fn parse_logos(body: &Value) -> AHashMap<u64, String> {
    let mut logos = AHashMap::new();
    let Some(data) = body.get("data").and_then(Value::as_object) else {
        return logos;
    };
    for value in data.values() {
        let infos: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for info in infos {
            if let (Some(id), Some(logo)) = (parse_str_u64(info.get("id")), str_field(info, "logo")) {
                logos.insert(id, logo);
            }
        }
    }
    logos
}
