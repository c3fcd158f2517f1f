//! Depth Simulator (C4) — the core of the pipeline.
//!
//! Pure, synchronous, deterministic: given sorted asks/bids, fees, and
//! venue constraints, produces a `FillResult`. Ported step-for-step from
//! the reference cross-fill walk (see DESIGN.md); no I/O, no randomness.

use crate::model::{FillResult, PriceLevel};

/// Constraints and fees handed in by the caller (C5). All optional fields
/// are `None` when the venue doesn't publish them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthParams {
    pub fee_buy: f64,
    pub fee_sell: f64,
    pub withdraw_fee_base: f64,
    pub max_quote_buy: Option<f64>,
    pub max_base_sell: Option<f64>,
    pub base_step: Option<f64>,
    pub min_base: Option<f64>,
    pub min_notional_buy: Option<f64>,
    pub min_notional_sell: Option<f64>,
}

/// Budget-stop epsilon from spec §4.4 step 7.
const BUDGET_EPS: f64 = 1e-12;

fn floor_step(value: f64, step: Option<f64>) -> f64 {
    match step {
        Some(s) if s > 0.0 => (value / s).floor() * s,
        _ => value,
    }
}

fn ceil_step(value: f64, step: Option<f64>) -> f64 {
    match step {
        Some(s) if s > 0.0 => (value / s).ceil() * s,
        _ => value,
    }
}

/// Walks `asks` (ascending) then `bids` (descending) and returns the
/// resulting fill. Empty books on either side return an all-zero,
/// non-`ok` result.
pub fn simulate_cross_fill(
    asks: &[PriceLevel],
    bids: &[PriceLevel],
    params: DepthParams,
) -> FillResult {
    if asks.is_empty() || bids.is_empty() {
        return FillResult::default();
    }

    let mut spent_quote = 0.0f64;
    let mut acquired_base = 0.0f64;
    let mut buy_fee_quote = 0.0f64;

    for level in asks {
        let (ask_px, ask_sz) = (level.price, level.size_base);

        let max_affordable_base = match params.max_quote_buy {
            Some(budget) => ((budget - spent_quote) / ask_px).max(0.0),
            None => f64::INFINITY,
        };
        let mut take_base = floor_step(ask_sz.min(max_affordable_base), params.base_step);

        let mut notional = take_base * ask_px;
        if let Some(min_notional_buy) = params.min_notional_buy {
            if take_base > 0.0 && notional < min_notional_buy {
                let mut need_base = min_notional_buy / ask_px;
                need_base = need_base.max(params.min_base.unwrap_or(0.0));
                need_base = ceil_step(need_base, params.base_step);
                let fits_budget = params
                    .max_quote_buy
                    .map(|budget| spent_quote + need_base * ask_px <= budget)
                    .unwrap_or(true);
                if need_base <= ask_sz && fits_budget {
                    take_base = need_base;
                    notional = take_base * ask_px;
                } else {
                    continue;
                }
            }
        }

        if let Some(min_base) = params.min_base {
            if take_base > 0.0 && take_base < min_base {
                let mut tb = ask_sz.min(max_affordable_base).min(min_base);
                tb = ceil_step(tb, params.base_step);
                let fits_budget = params
                    .max_quote_buy
                    .map(|budget| spent_quote + tb * ask_px <= budget)
                    .unwrap_or(true);
                if tb <= ask_sz && fits_budget {
                    take_base = tb;
                    notional = take_base * ask_px;
                } else {
                    continue;
                }
            }
        }

        if take_base <= 0.0 {
            break;
        }

        spent_quote += notional;
        buy_fee_quote += notional * params.fee_buy;
        acquired_base += take_base;

        if let Some(budget) = params.max_quote_buy {
            if spent_quote >= budget - BUDGET_EPS {
                break;
            }
        }
    }

    if let Some(max_base_sell) = params.max_base_sell {
        acquired_base = acquired_base.min(max_base_sell);
    }
    let transferable_base = (acquired_base - params.withdraw_fee_base).max(0.0);

    let mut remaining_base_to_sell = transferable_base;
    let mut received_quote = 0.0f64;
    let mut sell_fee_quote = 0.0f64;
    let mut qty_sold = 0.0f64;

    for level in bids {
        if remaining_base_to_sell <= 0.0 {
            break;
        }
        let (bid_px, bid_sz) = (level.price, level.size_base);
        let mut take_base = bid_sz.min(remaining_base_to_sell);
        let mut notional = take_base * bid_px;

        if let Some(min_notional_sell) = params.min_notional_sell {
            if notional < min_notional_sell {
                let mut need_base = ceil_step(min_notional_sell / bid_px, params.base_step);
                need_base = need_base.min(remaining_base_to_sell).min(bid_sz);
                if need_base <= 0.0
                    || params.min_base.map(|mb| need_base < mb).unwrap_or(false)
                {
                    continue;
                }
                take_base = need_base;
                notional = take_base * bid_px;
            }
        }

        take_base = floor_step(take_base, params.base_step);
        if take_base <= 0.0 {
            continue;
        }
        notional = take_base * bid_px;

        let fee = notional * params.fee_sell;
        received_quote += notional - fee;
        sell_fee_quote += fee;
        remaining_base_to_sell -= take_base;
        qty_sold += take_base;
    }

    let withdraw_fee_base = params.withdraw_fee_base;

    if acquired_base <= 0.0 || qty_sold <= 0.0 {
        return FillResult {
            qty_base_bought: acquired_base,
            qty_base_after_withdraw: transferable_base,
            qty_base_sold: qty_sold,
            spent_quote,
            received_quote,
            buy_fee_quote,
            sell_fee_quote,
            withdraw_fee_base,
            avg_buy_px: asks[0].price,
            avg_sell_px: bids[0].price,
            effective_spread: 0.0,
            net_profit_quote: received_quote - spent_quote - buy_fee_quote,
            roi: 0.0,
            ok: false,
        };
    }

    let avg_buy_px = spent_quote / acquired_base;
    let avg_sell_px = (received_quote + sell_fee_quote) / qty_sold;
    let effective_spread = (avg_sell_px - avg_buy_px) / avg_buy_px;
    let net_profit_quote = received_quote - spent_quote - buy_fee_quote;
    let roi = if spent_quote > 0.0 {
        net_profit_quote / spent_quote
    } else {
        0.0
    };

    FillResult {
        qty_base_bought: acquired_base,
        qty_base_after_withdraw: transferable_base,
        qty_base_sold: qty_sold,
        spent_quote,
        received_quote,
        buy_fee_quote,
        sell_fee_quote,
        withdraw_fee_base,
        avg_buy_px,
        avg_sell_px,
        effective_spread,
        net_profit_quote,
        roi,
        ok: qty_sold > 0.0 && net_profit_quote > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(pairs: &[(f64, f64)]) -> Vec<PriceLevel> {
        pairs
            .iter()
            .map(|&(p, s)| PriceLevel::new(p, s).unwrap())
            .collect()
    }

    #[test]
    fn empty_book_on_either_side_is_not_ok() {
        let asks: Vec<PriceLevel> = vec![];
        let bids = levels(&[(100.0, 1.0)]);
        let res = simulate_cross_fill(&asks, &bids, DepthParams::default());
        assert_eq!(res.qty_base_bought, 0.0);
        assert_eq!(res.qty_base_sold, 0.0);
        assert_eq!(res.net_profit_quote, 0.0);
        assert!(!res.ok);
    }

    #[test]
    fn single_level_profitable_cross() {
        let asks = levels(&[(100.0, 1.0)]);
        let bids = levels(&[(110.0, 1.0)]);
        let params = DepthParams {
            max_quote_buy: Some(100.0),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!((res.spent_quote - 100.0).abs() < 1e-9);
        assert!((res.qty_base_bought - 1.0).abs() < 1e-9);
        assert!((res.received_quote - 110.0).abs() < 1e-9);
        assert!((res.net_profit_quote - 10.0).abs() < 1e-9);
        assert!((res.roi - 0.1).abs() < 1e-9);
        assert!(res.ok);
    }

    #[test]
    fn moderate_fees_still_profitable() {
        let asks = levels(&[(100.0, 1.0)]);
        let bids = levels(&[(110.0, 1.0)]);
        let params = DepthParams {
            fee_buy: 0.01,
            fee_sell: 0.01,
            max_quote_buy: Some(100.0),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!((res.buy_fee_quote - 1.0).abs() < 1e-9);
        assert!((res.received_quote - 108.9).abs() < 1e-9);
        assert!((res.net_profit_quote - 7.9).abs() < 1e-6);
        assert!(res.ok);
    }

    #[test]
    fn high_fees_eliminate_edge() {
        let asks = levels(&[(100.0, 1.0)]);
        let bids = levels(&[(110.0, 1.0)]);
        let params = DepthParams {
            fee_buy: 0.06,
            fee_sell: 0.06,
            max_quote_buy: Some(100.0),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!((res.buy_fee_quote - 6.0).abs() < 1e-9);
        assert!((res.received_quote - 103.4).abs() < 1e-6);
        assert!((res.net_profit_quote - (-2.6)).abs() < 1e-6);
        assert!(!res.ok);
    }

    #[test]
    fn withdraw_fee_truncates_sell_side() {
        let asks = levels(&[(100.0, 1.0)]);
        let bids = levels(&[(110.0, 1.0)]);
        let params = DepthParams {
            withdraw_fee_base: 0.5,
            max_quote_buy: Some(100.0),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!((res.qty_base_bought - 1.0).abs() < 1e-9);
        assert!((res.qty_base_after_withdraw - 0.5).abs() < 1e-9);
        assert!((res.qty_base_sold - 0.5).abs() < 1e-9);
        assert!((res.received_quote - 55.0).abs() < 1e-9);
        assert!((res.net_profit_quote - (-45.0)).abs() < 1e-9);
        assert!(!res.ok);
    }

    #[test]
    fn lot_step_and_min_notional_are_honored() {
        let asks = levels(&[(100.0, 0.003)]);
        let bids = levels(&[(101.0, 1.0)]);
        let params = DepthParams {
            base_step: Some(0.001),
            min_notional_buy: Some(0.25),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!((res.qty_base_bought - 0.003).abs() < 1e-9);
        assert!((res.spent_quote - 0.30).abs() < 1e-9);
        assert!((res.received_quote - 0.303).abs() < 1e-9);
        assert!((res.net_profit_quote - 0.003).abs() < 1e-9);
        assert!(res.ok);
    }

    #[test]
    fn budget_spans_two_levels_and_stays_profitable() {
        let asks = levels(&[(100.0, 1.0), (101.0, 1.0)]);
        let bids = levels(&[(105.0, 10.0)]);
        let params = DepthParams {
            max_quote_buy: Some(150.0),
            ..Default::default()
        };
        let res = simulate_cross_fill(&asks, &bids, params);
        assert!(res.ok);
        assert!(res.net_profit_quote > 0.0);
        assert!(res.spent_quote <= 150.0 + 1e-6);
    }

    #[test]
    fn property_ok_implies_positive_net_and_positive_qty_sold() {
        let asks = levels(&[(100.0, 1.0), (101.0, 2.0)]);
        let bids = levels(&[(103.0, 0.5), (102.0, 2.0)]);
        let res = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                max_quote_buy: Some(300.0),
                ..Default::default()
            },
        );
        if res.ok {
            assert!(res.net_profit_quote > 0.0);
            assert!(res.qty_base_sold > 0.0);
        }
    }

    #[test]
    fn property_quantities_are_non_increasing_through_withdrawal() {
        let asks = levels(&[(100.0, 2.0)]);
        let bids = levels(&[(110.0, 2.0)]);
        let res = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                withdraw_fee_base: 0.1,
                max_quote_buy: Some(200.0),
                ..Default::default()
            },
        );
        assert!(res.qty_base_sold <= res.qty_base_after_withdraw + 1e-9);
        assert!(res.qty_base_after_withdraw <= res.qty_base_bought + 1e-9);
    }

    #[test]
    fn property_increasing_fees_decreases_net_profit() {
        let asks = levels(&[(100.0, 1.0)]);
        let bids = levels(&[(110.0, 1.0)]);
        let low = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                fee_buy: 0.001,
                fee_sell: 0.001,
                max_quote_buy: Some(100.0),
                ..Default::default()
            },
        );
        let high = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                fee_buy: 0.02,
                fee_sell: 0.02,
                max_quote_buy: Some(100.0),
                ..Default::default()
            },
        );
        assert!(high.net_profit_quote < low.net_profit_quote);
    }

    #[test]
    fn property_increasing_budget_never_decreases_qty_bought() {
        let asks = levels(&[(100.0, 1.0), (101.0, 1.0)]);
        let bids = levels(&[(110.0, 10.0)]);
        let small = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                max_quote_buy: Some(50.0),
                ..Default::default()
            },
        );
        let large = simulate_cross_fill(
            &asks,
            &bids,
            DepthParams {
                max_quote_buy: Some(200.0),
                ..Default::default()
            },
        );
        assert!(large.qty_base_bought >= small.qty_base_bought);
    }
}
