//! Screener filter configuration.
//!
//! A `ScreenFilter` says which test a screener task applies to each stored
//! symbol. Filters are plain data so they can be built from CLI flags or
//! deserialized from JSON.

use serde::{Deserialize, Serialize};

use crate::algo::{
    detect_pivots, has_multiple_move, smoothen, yoy_growth_at_least, AlgoError, NO_MIN_PRICE,
};
use crate::data::StockData;

/// Test applied to one symbol's stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenFilter {
    /// Daily prices rose `multiple` times from a smoothed trough to a later smoothed peak.
    PriceMove {
        /// Smoothing threshold, fraction in (0, 1)
        threshold_pct: f64,
        multiple: f64,
        /// Troughs below this price never start a move
        #[serde(default)]
        min_price: Option<f64>,
    },

    /// Latest quarterly `metric` grew at least `threshold_pct` year over year.
    YoyGrowth { metric: String, threshold_pct: f64 },

    /// Every inner filter passes.
    All { filters: Vec<ScreenFilter> },
}

impl ScreenFilter {
    /// Check arguments without any data.
    pub fn validate(&self) -> Result<(), AlgoError> {
        match self {
            Self::PriceMove {
                threshold_pct,
                multiple,
                min_price,
            } => {
                smoothen(&[], *threshold_pct)?;
                has_multiple_move(&[], *multiple, min_price.unwrap_or(NO_MIN_PRICE))?;
                Ok(())
            }
            Self::YoyGrowth {
                metric,
                threshold_pct,
            } => yoy_growth_at_least(&[], metric, *threshold_pct).map(|_| ()),
            Self::All { filters } => filters.iter().try_for_each(Self::validate),
        }
    }

    /// Apply the filter to one symbol's data.
    pub fn evaluate(&self, data: &StockData) -> Result<bool, AlgoError> {
        match self {
            Self::PriceMove {
                threshold_pct,
                multiple,
                min_price,
            } => {
                let pivots = detect_pivots(&data.prices.to_price_points());
                let smoothed = smoothen(&pivots, *threshold_pct)?;
                let (found, _) =
                    has_multiple_move(&smoothed, *multiple, min_price.unwrap_or(NO_MIN_PRICE))?;
                Ok(found)
            }
            Self::YoyGrowth {
                metric,
                threshold_pct,
            } => {
                let (passed, _) = yoy_growth_at_least(
                    &data.financial_statements.quarter,
                    metric,
                    *threshold_pct,
                )?;
                Ok(passed)
            }
            Self::All { filters } => {
                for filter in filters {
                    if !filter.evaluate(data)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Short human-readable summary, used as the default task description.
    pub fn describe(&self) -> String {
        match self {
            Self::PriceMove {
                threshold_pct,
                multiple,
                min_price,
            } => {
                let mut text = format!(
                    "{multiple}x price move (smoothing {:.1}%)",
                    threshold_pct * 100.0
                );
                if let Some(min) = min_price {
                    text.push_str(&format!(", troughs >= ${min}"));
                }
                text
            }
            Self::YoyGrowth {
                metric,
                threshold_pct,
            } => format!("{metric} YoY growth >= {:.1}%", threshold_pct * 100.0),
            Self::All { filters } => filters
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(" and "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FinancialRecord, FinancialStatements, HistoricalPrice, PriceHistory};
    use serde_json::Map;

    fn history(closes: &[f64]) -> PriceHistory {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceHistory {
            symbol: "TEST".into(),
            historical: closes
                .iter()
                .enumerate()
                .rev()
                .map(|(i, &c)| HistoricalPrice {
                    date: (start + chrono::Duration::days(i as i64))
                        .format("%Y-%m-%d")
                        .to_string(),
                    open: c,
                    high: c * 1.01,
                    low: c * 0.99,
                    close: c,
                    volume: 1.0,
                    extra: Map::new(),
                })
                .collect(),
        }
    }

    fn stock(closes: &[f64], revenue: &[f64]) -> StockData {
        let dates = ["2023-03-31", "2023-06-30", "2023-09-30", "2023-12-31", "2024-03-31"];
        StockData {
            financial_statements: FinancialStatements {
                quarter: revenue
                    .iter()
                    .zip(dates)
                    .map(|(&v, d)| FinancialRecord::new(d, &[("revenue", v)]))
                    .collect(),
            },
            prices: history(closes),
        }
    }

    fn price_move(multiple: f64) -> ScreenFilter {
        ScreenFilter::PriceMove {
            threshold_pct: 0.05,
            multiple,
            min_price: None,
        }
    }

    #[test]
    fn test_price_move_filter() {
        // dip to 10, rally to 30, pull back
        let data = stock(&[20.0, 10.0, 15.0, 30.0, 25.0], &[]);
        assert!(price_move(2.0).evaluate(&data).unwrap());
        assert!(!price_move(3.5).evaluate(&data).unwrap());
    }

    #[test]
    fn test_price_move_respects_min_price() {
        let data = stock(&[20.0, 10.0, 15.0, 30.0, 25.0], &[]);
        let filter = ScreenFilter::PriceMove {
            threshold_pct: 0.05,
            multiple: 2.0,
            min_price: Some(12.0),
        };
        assert!(!filter.evaluate(&data).unwrap());
    }

    #[test]
    fn test_yoy_growth_filter() {
        let data = stock(&[], &[1.0, 1.0, 1.0, 1.0, 1.25]);
        let filter = ScreenFilter::YoyGrowth {
            metric: "revenue".into(),
            threshold_pct: 0.2,
        };
        assert!(filter.evaluate(&data).unwrap());
    }

    #[test]
    fn test_all_requires_every_filter() {
        let data = stock(&[20.0, 10.0, 15.0, 30.0, 25.0], &[1.0, 1.0, 1.0, 1.0, 1.1]);
        let growth = ScreenFilter::YoyGrowth {
            metric: "revenue".into(),
            threshold_pct: 0.2,
        };
        let both = ScreenFilter::All {
            filters: vec![price_move(2.0), growth],
        };
        assert!(!both.evaluate(&data).unwrap());
        let only_move = ScreenFilter::All {
            filters: vec![price_move(2.0)],
        };
        assert!(only_move.evaluate(&data).unwrap());
    }

    #[test]
    fn test_validate() {
        assert!(price_move(2.0).validate().is_ok());
        assert!(price_move(0.0).validate().is_err());
        assert!(ScreenFilter::PriceMove {
            threshold_pct: 1.5,
            multiple: 2.0,
            min_price: None
        }
        .validate()
        .is_err());
        let nested = ScreenFilter::All {
            filters: vec![ScreenFilter::YoyGrowth {
                metric: String::new(),
                threshold_pct: 0.1,
            }],
        };
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let filter: ScreenFilter = serde_json::from_str(
            r#"{"kind": "price_move", "threshold_pct": 0.03, "multiple": 2.0}"#,
        )
        .unwrap();
        assert_eq!(filter, ScreenFilter::PriceMove {
            threshold_pct: 0.03,
            multiple: 2.0,
            min_price: None
        });
    }

    #[test]
    fn test_describe() {
        assert_eq!(price_move(2.0).describe(), "2x price move (smoothing 5.0%)");
        let growth = ScreenFilter::YoyGrowth {
            metric: "revenue".into(),
            threshold_pct: 0.25,
        };
        assert_eq!(growth.describe(), "revenue YoY growth >= 25.0%");
    }
}
