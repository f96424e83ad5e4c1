use crate::models::{Candle, ExitReason, TradeExit};

/// First-trigger daily exit scan. `future` holds the ticker's candles after
/// the entry date in ascending order; at most `max_holding_days` of them are
/// examined. Take-profit is checked before stop-loss on each day. When
/// neither threshold triggers within the window the trade exits at the last
/// in-window close. An empty `future` yields a `no_data` exit with null
/// price, which the metrics stage excludes.
pub fn simulate_exit(
    entry_price: f64,
    future: &[&Candle],
    take_profit_threshold: f64,
    stop_loss_threshold: f64,
    max_holding_days: usize,
) -> TradeExit {
    if future.is_empty() {
        return TradeExit {
            exit_date: None,
            exit_price: None,
            exit_reason: ExitReason::NoData,
            actual_return: None,
            holding_days: 0,
        };
    }

    let horizon = future.len().min(max_holding_days);
    for (day_offset, candle) in future[..horizon].iter().enumerate() {
        let current_return = (candle.close - entry_price) / entry_price;
        if current_return >= take_profit_threshold {
            return TradeExit {
                exit_date: Some(candle.date),
                exit_price: Some(candle.close),
                exit_reason: ExitReason::TakeProfit,
                actual_return: Some(current_return),
                holding_days: day_offset as i64 + 1,
            };
        }
        if current_return <= -stop_loss_threshold {
            return TradeExit {
                exit_date: Some(candle.date),
                exit_price: Some(candle.close),
                exit_reason: ExitReason::StopLoss,
                actual_return: Some(current_return),
                holding_days: day_offset as i64 + 1,
            };
        }
    }

    let last = future[horizon - 1];
    TradeExit {
        exit_date: Some(last.date),
        exit_price: Some(last.close),
        exit_reason: ExitReason::MaxHolding,
        actual_return: Some((last.close - entry_price) / entry_price),
        holding_days: horizon as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn future_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                ticker: "AAA".to_string(),
                date: start + chrono::Duration::days(i as i64 + 1),
                open: close,
                high: close,
                low: close,
                close,
                volume: 100,
            })
            .collect()
    }

    fn refs(candles: &[Candle]) -> Vec<&Candle> {
        candles.iter().collect()
    }

    #[test]
    fn stop_loss_triggers_on_first_breach() {
        let future = future_from_closes(&[102.0, 98.0, 94.0]);
        let exit = simulate_exit(100.0, &refs(&future), 0.50, 0.05, 10);

        assert_eq!(exit.exit_reason, ExitReason::StopLoss);
        assert_eq!(exit.exit_price, Some(94.0));
        assert_eq!(exit.exit_date, Some(future[2].date));
        assert_eq!(exit.holding_days, 3);
        assert!((exit.actual_return.expect("return") + 0.06).abs() < 1e-12);
    }

    #[test]
    fn take_profit_checked_before_stop_loss() {
        // A close that clears both thresholds resolves as take-profit.
        let future = future_from_closes(&[160.0]);
        let exit = simulate_exit(100.0, &refs(&future), 0.50, 0.05, 10);
        assert_eq!(exit.exit_reason, ExitReason::TakeProfit);
        assert_eq!(exit.actual_return, Some(0.6));
        assert_eq!(exit.holding_days, 1);
    }

    #[test]
    fn first_triggering_day_wins_over_later_extremes() {
        // Day 2 would take-profit, but day 1 already stops out.
        let future = future_from_closes(&[94.0, 160.0]);
        let exit = simulate_exit(100.0, &refs(&future), 0.50, 0.05, 10);
        assert_eq!(exit.exit_reason, ExitReason::StopLoss);
        assert_eq!(exit.holding_days, 1);
    }

    #[test]
    fn max_holding_fallback_after_quiet_window() {
        let closes = [101.0, 99.0, 100.5, 98.0, 102.0, 101.5, 99.5, 100.0, 101.0, 102.5];
        let future = future_from_closes(&closes);
        let exit = simulate_exit(100.0, &refs(&future), 0.50, 0.05, 10);

        assert_eq!(exit.exit_reason, ExitReason::MaxHolding);
        assert_eq!(exit.holding_days, 10);
        assert_eq!(exit.exit_price, Some(102.5));
        assert_eq!(exit.exit_date, Some(future[9].date));
    }

    #[test]
    fn window_is_capped_at_max_holding_days() {
        let future = future_from_closes(&[101.0, 101.5, 102.0, 160.0]);
        let exit = simulate_exit(100.0, &refs(&future), 0.50, 0.05, 3);
        assert_eq!(exit.exit_reason, ExitReason::MaxHolding);
        assert_eq!(exit.exit_price, Some(102.0));
        assert_eq!(exit.holding_days, 3);
    }

    #[test]
    fn no_future_rows_yields_no_data() {
        let exit = simulate_exit(100.0, &[], 0.50, 0.05, 10);
        assert_eq!(exit.exit_reason, ExitReason::NoData);
        assert_eq!(exit.exit_price, None);
        assert_eq!(exit.actual_return, None);
        assert_eq!(exit.holding_days, 0);
    }
}
