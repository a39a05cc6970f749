//! CoinGecko `/coins/markets` response parser.
//!
//! The body is a JSON array of coin objects. Items without an id or symbol are
//! skipped; numeric fields may be `null`.
//!
//! | Field                                      | `RawEntity`       |
//! |--------------------------------------------|-------------------|
//! | `current_price`                            | `price`           |
//! | `market_cap`                               | `market_cap`      |
//! | `total_volume`                             | `volume_24h`      |
//! | `price_change_percentage_24h`              | `changes.h24`     |
//! | `price_change_percentage_{w}_in_currency`  | `changes.{w}`     |

use movers_core::{ChangeSet, MoversError, RawEntity};
use serde_json::Value;

use crate::json_util::{parse_f64_any, parse_f64_field, str_field};

/// Parse one `/coins/markets` page.
pub fn parse_markets(body: &Value) -> Result<Vec<RawEntity>, MoversError> {
    let items = body
        .as_array()
        .ok_or_else(|| MoversError::Decode("coingecko: expected a JSON array".into()))?;
    Ok(items.iter().filter_map(parse_coin).collect())
}

fn parse_coin(v: &Value) -> Option<RawEntity> {
    let id = str_field(v, "id")?;
    let symbol = str_field(v, "symbol")?;
    Some(RawEntity {
        name: str_field(v, "name").unwrap_or_else(|| symbol.clone()),
        id,
        symbol,
        image: str_field(v, "image"),
        price: parse_f64_field(v, "current_price"),
        market_cap: parse_f64_field(v, "market_cap"),
        liquidity: None,
        volume_24h: parse_f64_field(v, "total_volume"),
        changes: ChangeSet {
            h1: parse_f64_field(v, "price_change_percentage_1h_in_currency"),
            h24: parse_f64_any(
                v,
                &["price_change_percentage_24h", "price_change_percentage_24h_in_currency"],
            ),
            d7: parse_f64_field(v, "price_change_percentage_7d_in_currency"),
            d30: parse_f64_field(v, "price_change_percentage_30d_in_currency"),
            y1: parse_f64_field(v, "price_change_percentage_1y_in_currency"),
        },
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_market_page() {
        let body = json!([
            {
                "id": "bitcoin",
                "symbol": "btc",
                "name": "Bitcoin",
                "image": "https://assets.coingecko.com/btc.png",
                "current_price": 64000.5,
                "market_cap": 1.26e12,
                "total_volume": 3.1e10,
                "price_change_percentage_24h": 2.5,
                "price_change_percentage_7d_in_currency": -1.25,
                "price_change_percentage_30d_in_currency": null,
                "price_change_percentage_1y_in_currency": 110.0
            },
            { "id": "", "symbol": "bad" },
            { "symbol": "noid" },
            {
                "id": "thin",
                "symbol": "thin",
                "current_price": null,
                "price_change_percentage_24h": null
            }
        ]);

        let coins = parse_markets(&body).unwrap();
        assert_eq!(coins.len(), 2);

        let btc = &coins[0];
        assert_eq!(btc.symbol, "btc");
        assert_eq!(btc.price, Some(64000.5));
        assert_eq!(btc.market_cap, Some(1.26e12));
        assert_eq!(btc.liquidity, None);
        assert_eq!(btc.changes.h24, Some(2.5));
        assert_eq!(btc.changes.d7, Some(-1.25));
        assert_eq!(btc.changes.d30, None);
        assert_eq!(btc.changes.y1, Some(110.0));

        // Kept, but not rankable.
        assert_eq!(coins[1].name, "thin");
        assert_eq!(coins[1].price, None);
    }

    #[test]
    fn non_array_body_is_decode_error() {
        let err = parse_markets(&json!({ "status": { "error_code": 429 } })).unwrap_err();
        assert!(matches!(err, MoversError::Decode(_)));
    }
}
