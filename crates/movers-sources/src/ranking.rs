//! Ranking and projection of filtered entities.
//!
//! Pure functions: no I/O, no clock. Sorting is stable (`sort_by`), so ties
//! keep upstream order.
//!
//! | Policy  | Gainers                         | Losers                          |
//! |---------|---------------------------------|---------------------------------|
//! | `Both`  | top N of all by change desc     | top N of all by change asc      |
//! | `Split` | top N of `change > 0`, desc     | top N of `change < 0`, asc      |

use movers_core::{ChangeWindow, RankedEntity, RawEntity};

/// How the two lists are drawn from the filtered universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPolicy {
    /// Both lists rank every valid entity regardless of sign.
    Both,
    /// Gainers only from positive changes, losers only from negative ones.
    Split,
}

/// Per-source ranking parameters.
#[derive(Debug, Clone)]
pub struct RankSpec {
    pub window: ChangeWindow,
    pub top_n: usize,
    pub sign: SignPolicy,
    pub placeholder_image: String,
}

/// Ranked raw entities, before projection.
///
/// Kept in raw form so a source can side-load metadata (logos) for just the
/// selected entities.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub gainers: Vec<RawEntity>,
    pub losers: Vec<RawEntity>,
}

impl Selection {
    /// Every selected entity, gainers first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RawEntity> {
        self.gainers.iter_mut().chain(self.losers.iter_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawEntity> {
        self.gainers.iter().chain(self.losers.iter())
    }
}

fn change_of(e: &RawEntity, window: ChangeWindow) -> f64 {
    e.changes.get(window).unwrap_or(0.0)
}

/// Drop unrankable entities, order, and slice the top N each way.
pub fn select(entities: &[RawEntity], spec: &RankSpec) -> Selection {
    let window = spec.window;
    let valid: Vec<&RawEntity> = entities.iter().filter(|e| e.is_rankable(window)).collect();

    let mut gainers: Vec<&RawEntity> = match spec.sign {
        SignPolicy::Both => valid.clone(),
        SignPolicy::Split => valid.iter().copied().filter(|e| change_of(e, window) > 0.0).collect(),
    };
    let mut losers: Vec<&RawEntity> = match spec.sign {
        SignPolicy::Both => valid,
        SignPolicy::Split => valid.into_iter().filter(|e| change_of(e, window) < 0.0).collect(),
    };

    gainers.sort_by(|a, b| change_of(b, window).total_cmp(&change_of(a, window)));
    losers.sort_by(|a, b| change_of(a, window).total_cmp(&change_of(b, window)));

    Selection {
        gainers: gainers.into_iter().take(spec.top_n).cloned().collect(),
        losers: losers.into_iter().take(spec.top_n).cloned().collect(),
    }
}

/// Project a selection onto the public shape.
pub fn format(selection: &Selection, spec: &RankSpec) -> (Vec<RankedEntity>, Vec<RankedEntity>) {
    let project = |list: &[RawEntity]| -> Vec<RankedEntity> {
        list.iter()
            .filter_map(|e| RankedEntity::project(e, &spec.placeholder_image))
            .collect()
    };
    (project(&selection.gainers), project(&selection.losers))
}

#[cfg(test)]
mod tests {
    use movers_core::ChangeSet;

    use super::*;

    fn entity(symbol: &str, price: Option<f64>, h24: Option<f64>) -> RawEntity {
        RawEntity {
            id: symbol.to_lowercase(),
            symbol: symbol.into(),
            name: symbol.into(),
            price,
            changes: ChangeSet {
                h24,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn spec(top_n: usize, sign: SignPolicy) -> RankSpec {
        RankSpec {
            window: ChangeWindow::H24,
            top_n,
            sign,
            placeholder_image: "/generic.png".into(),
        }
    }

    /// 50 entities spread evenly over -40%..+120%.
    fn spread() -> Vec<RawEntity> {
        (0..50)
            .map(|i| {
                let change = -40.0 + (160.0 * i as f64 / 49.0);
                entity(&format!("T{i}"), Some(1.0), Some(change))
            })
            .collect()
    }

    #[test]
    fn top_twenty_of_spread() {
        let s = spec(20, SignPolicy::Both);
        let (gainers, losers) = format(&select(&spread(), &s), &s);
        assert_eq!(gainers.len(), 20);
        assert_eq!(losers.len(), 20);
        assert!((gainers[0].change_24h - 120.0).abs() < 1e-9);
        assert!((losers[0].change_24h + 40.0).abs() < 1e-9);
        assert!(gainers.windows(2).all(|w| w[0].change_24h >= w[1].change_24h));
        assert!(losers.windows(2).all(|w| w[0].change_24h <= w[1].change_24h));
    }

    #[test]
    fn null_price_or_change_never_ranked() {
        let input = vec![
            entity("OK", Some(1.0), Some(5.0)),
            entity("NOPRICE", None, Some(900.0)),
            entity("NOCHANGE", Some(1.0), None),
            entity("NAN", Some(1.0), Some(f64::NAN)),
        ];
        let s = spec(10, SignPolicy::Both);
        let sel = select(&input, &s);
        let symbols: Vec<_> = sel.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["OK", "OK"]);
    }

    #[test]
    fn split_policy_separates_by_sign() {
        let input = vec![
            entity("UP", Some(1.0), Some(3.0)),
            entity("FLAT", Some(1.0), Some(0.0)),
            entity("DOWN", Some(1.0), Some(-3.0)),
        ];
        let sel = select(&input, &spec(10, SignPolicy::Split));
        assert_eq!(sel.gainers.len(), 1);
        assert_eq!(sel.gainers[0].symbol, "UP");
        assert_eq!(sel.losers.len(), 1);
        assert_eq!(sel.losers[0].symbol, "DOWN");
    }

    #[test]
    fn ties_keep_input_order() {
        let input = vec![
            entity("A", Some(1.0), Some(7.0)),
            entity("B", Some(1.0), Some(7.0)),
            entity("C", Some(1.0), Some(7.0)),
        ];
        let sel = select(&input, &spec(3, SignPolicy::Both));
        let g: Vec<_> = sel.gainers.iter().map(|e| e.symbol.as_str()).collect();
        let l: Vec<_> = sel.losers.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(g, vec!["A", "B", "C"]);
        assert_eq!(l, vec!["A", "B", "C"]);
    }

    #[test]
    fn missing_image_gets_placeholder() {
        let s = spec(1, SignPolicy::Both);
        let (gainers, _) = format(&select(&[entity("X", Some(1.0), Some(1.0))], &s), &s);
        assert_eq!(gainers[0].image, "/generic.png");
    }

    #[test]
    fn ranks_by_selected_window() {
        let mut a = entity("A", Some(1.0), Some(1.0));
        a.changes.d7 = Some(50.0);
        let mut b = entity("B", Some(1.0), Some(9.0));
        b.changes.d7 = Some(-5.0);
        let s = RankSpec {
            window: ChangeWindow::D7,
            ..spec(1, SignPolicy::Both)
        };
        let sel = select(&[b, a], &s);
        assert_eq!(sel.gainers[0].symbol, "A");
        assert_eq!(sel.losers[0].symbol, "B");
    }
}
