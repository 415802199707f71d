//! Re-bucketizes a trade list into equal timeslots and computes, per slot:
//! buy/sell volume and their share, average price, and the average-price
//! change relative to the previous slot.
//!
//! Slot boundaries are derived from the observed trade range, not from the
//! caller's slot duration: `slot_ms = (last − first) / number_of_timeslots`
//! after trimming to the requested period. Slot `k` is therefore the k-th
//! slot counted from the first trade in range, not a clock-aligned bucket.
//!
//! A slot is recorded only when a later trade lands at or past its right
//! edge; that trade closes the slot and is not counted in the next one. The
//! final slot often stays zeroed for this reason.

use corelib::AggTrade;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatsError {
    #[error("number of timeslots must be at least 1")]
    InvalidTimeslots,

    #[error("timeslot duration must be at least 1 ms")]
    InvalidTimeslotDuration,

    #[error("trade pool is empty")]
    EmptyPool,

    #[error("no trades inside the requested period")]
    NoTradesInWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStats {
    /// Base-asset volume bought by takers (buyer was not the maker)
    pub buy_volume: f64,
    /// Base-asset volume sold by takers (buyer was the maker)
    pub sell_volume: f64,
    pub buy_volume_percentage: i64,
    pub sell_volume_percentage: i64,
    /// Relative to the previous slot's average price; 0 for slot 0
    pub price_change_percentage: i64,
    pub avg_price: f64,
}

#[derive(Default)]
struct SlotAccumulator {
    buy_volume: f64,
    sell_volume: f64,
    total_asset_cost: f64,
    trades: usize,
}

impl SlotAccumulator {
    fn add(&mut self, trade: &AggTrade) {
        if trade.is_buyer_maker {
            self.sell_volume += trade.qty;
        } else {
            self.buy_volume += trade.qty;
        }
        self.total_asset_cost += trade.notional();
        self.trades += 1;
    }

    fn finish(&self, prev_avg_price: Option<f64>) -> SlotStats {
        if self.trades == 0 {
            return SlotStats::default();
        }

        let volume = self.buy_volume + self.sell_volume;
        if volume <= 0.0 {
            return SlotStats::default();
        }

        let avg_price = self.total_asset_cost / volume;
        let price_change_percentage = match prev_avg_price {
            Some(prev) if prev > 0.0 => percent(avg_price - prev, prev),
            _ => 0,
        };

        SlotStats {
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            buy_volume_percentage: percent(self.buy_volume, volume),
            sell_volume_percentage: percent(self.sell_volume, volume),
            price_change_percentage,
            avg_price,
        }
    }
}

fn percent(part: f64, whole: f64) -> i64 {
    (100.0 * part / whole).round() as i64
}

/// Statistics for the trades of the last `timeslot_dur_ms · number_of_timeslots`
/// milliseconds before `now_ms`.
///
/// The input is borrowed immutably; callers pass a copy of a pool snapshot.
/// The result always has exactly `number_of_timeslots` entries.
pub fn statistic_data(
    trades: &[AggTrade],
    timeslot_dur_ms: i64,
    number_of_timeslots: usize,
    now_ms: i64,
) -> Result<Vec<SlotStats>, StatsError> {
    if number_of_timeslots < 1 {
        return Err(StatsError::InvalidTimeslots);
    }
    if timeslot_dur_ms < 1 {
        return Err(StatsError::InvalidTimeslotDuration);
    }
    if trades.is_empty() {
        return Err(StatsError::EmptyPool);
    }

    let slots = number_of_timeslots as i64;
    let period_start_ms = now_ms.saturating_sub(timeslot_dur_ms.saturating_mul(slots));

    let first_index = trades.partition_point(|t| t.time_ms < period_start_ms);
    let trades = &trades[first_index..];
    let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
        return Err(StatsError::NoTradesInWindow);
    };

    let slot_ms = (last.time_ms - first.time_ms) / slots;
    let mut slot_start = first.time_ms;
    let mut slot_end = slot_start + slot_ms;

    let mut out = vec![SlotStats::default(); number_of_timeslots];
    let mut current = 0usize;
    let mut acc = SlotAccumulator::default();

    for trade in trades {
        if current == number_of_timeslots {
            break;
        }

        if slot_start <= trade.time_ms && trade.time_ms < slot_end {
            acc.add(trade);
        }

        if trade.time_ms >= slot_end {
            let prev = current.checked_sub(1).map(|k| out[k].avg_price);
            out[current] = acc.finish(prev);

            slot_start = slot_end;
            slot_end = slot_start + slot_ms;
            acc = SlotAccumulator::default();
            current += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trade(id: u64, time_ms: i64, qty: f64, price: f64, is_buyer_maker: bool) -> AggTrade {
        AggTrade {
            id,
            price,
            qty,
            first_trade_id: id,
            last_trade_id: id,
            time_ms,
            is_buyer_maker,
        }
    }

    #[test]
    fn boundary_trades_close_slots_without_joining_the_next() {
        let trades: Vec<_> = [0, 10, 20, 30]
            .iter()
            .zip([100.0, 101.0, 102.0, 103.0])
            .enumerate()
            .map(|(i, (&t, p))| trade(i as u64, t, 1.0, p, false))
            .collect();

        let out = statistic_data(&trades, 10, 3, 30).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].buy_volume, 1.0);
        assert_eq!(out[0].sell_volume, 0.0);
        assert_eq!(out[0].buy_volume_percentage, 100);
        assert_eq!(out[0].avg_price, 100.0);
        // t=10 closed slot 0 and t=20 closed slot 1 before anything landed in it
        assert_eq!(out[1], SlotStats::default());
        assert_eq!(out[2], SlotStats::default());
    }

    #[test]
    fn interior_trades_fill_every_slot() {
        // slot_ms = 10; t=10,20,30 close slots 0,1,2
        let trades = vec![
            trade(1, 0, 1.0, 100.0, false),
            trade(2, 5, 3.0, 100.0, true),
            trade(3, 10, 1.0, 999.0, false),
            trade(4, 15, 2.0, 110.0, false),
            trade(5, 20, 1.0, 999.0, false),
            trade(6, 25, 1.0, 99.0, true),
            trade(7, 30, 1.0, 999.0, false),
        ];

        let out = statistic_data(&trades, 10, 3, 30).unwrap();

        assert_eq!(out[0].buy_volume, 1.0);
        assert_eq!(out[0].sell_volume, 3.0);
        assert_eq!(out[0].buy_volume_percentage, 25);
        assert_eq!(out[0].sell_volume_percentage, 75);
        assert_eq!(out[0].avg_price, 100.0);
        assert_eq!(out[0].price_change_percentage, 0);

        assert_eq!(out[1].buy_volume, 2.0);
        assert_eq!(out[1].avg_price, 110.0);
        assert_eq!(out[1].price_change_percentage, 10);

        assert_eq!(out[2].sell_volume, 1.0);
        assert_eq!(out[2].sell_volume_percentage, 100);
        assert_eq!(out[2].avg_price, 99.0);
        assert_eq!(out[2].price_change_percentage, -10);
    }

    #[test]
    fn average_price_is_volume_weighted() {
        let trades = vec![
            trade(1, 0, 1.0, 100.0, false),
            trade(2, 1, 3.0, 200.0, true),
            trade(3, 10, 1.0, 1.0, false),
        ];

        let out = statistic_data(&trades, 10, 1, 10).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].avg_price, 175.0);
    }

    #[test]
    fn trades_before_requested_period_are_ignored() {
        let trades = vec![
            trade(1, 0, 50.0, 1.0, false),
            trade(2, 100, 1.0, 100.0, false),
            trade(3, 110, 1.0, 100.0, false),
        ];

        // period = [100, 110]
        let out = statistic_data(&trades, 5, 2, 110).unwrap();
        assert_eq!(out[0].buy_volume, 1.0);
        assert_eq!(out[0].avg_price, 100.0);
    }

    #[test]
    fn empty_price_predecessor_gives_zero_change() {
        let trades = vec![
            trade(1, 0, 1.0, 100.0, false),
            trade(2, 10, 1.0, 100.0, false),
            trade(3, 20, 1.0, 100.0, false),
            trade(4, 25, 1.0, 120.0, false),
            trade(5, 30, 1.0, 100.0, false),
        ];

        let out = statistic_data(&trades, 10, 3, 30).unwrap();
        assert_eq!(out[1], SlotStats::default());
        assert_eq!(out[2].avg_price, 120.0);
        assert_eq!(out[2].price_change_percentage, 0);
    }

    #[test]
    fn zero_width_slots_never_overflow_the_output() {
        let trades: Vec<_> = (0..10).map(|i| trade(i, 5, 1.0, 100.0, false)).collect();
        let out = statistic_data(&trades, 1, 3, 5).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn argument_errors() {
        let trades = vec![trade(1, 0, 1.0, 1.0, false)];
        assert_eq!(statistic_data(&trades, 10, 0, 10), Err(StatsError::InvalidTimeslots));
        assert_eq!(
            statistic_data(&trades, 0, 1, 10),
            Err(StatsError::InvalidTimeslotDuration)
        );
        assert_eq!(statistic_data(&[], 10, 1, 10), Err(StatsError::EmptyPool));
        assert_eq!(
            statistic_data(&trades, 10, 1, 1_000),
            Err(StatsError::NoTradesInWindow)
        );
    }

    #[test]
    fn single_slot_covers_the_trimmed_range() {
        let trades = vec![
            trade(1, 100, 2.0, 10.0, false),
            trade(2, 150, 2.0, 20.0, true),
            trade(3, 200, 1.0, 30.0, false),
        ];
        let out = statistic_data(&trades, 100, 1, 200).unwrap();
        assert_eq!(out[0].buy_volume, 2.0);
        assert_eq!(out[0].sell_volume, 2.0);
        assert_eq!(out[0].avg_price, 15.0);
    }

    fn arb_trades() -> impl Strategy<Value = Vec<AggTrade>> {
        prop::collection::vec((0i64..50, 0.0f64..10.0, 1.0f64..1000.0, any::<bool>()), 1..200)
            .prop_map(|raw| {
                let mut t = 0i64;
                raw.into_iter()
                    .enumerate()
                    .map(|(i, (gap, qty, price, maker))| {
                        t += gap;
                        trade(i as u64, t, qty, price, maker)
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn output_length_matches_request(trades in arb_trades(), n in 1usize..20, dur in 1i64..500) {
            // the last trade always falls inside the period ending now
            let now = trades.last().unwrap().time_ms;
            let out = statistic_data(&trades, dur, n, now).unwrap();
            prop_assert_eq!(out.len(), n);
        }

        #[test]
        fn volume_shares_stay_in_bounds(trades in arb_trades(), n in 1usize..20) {
            let now = trades.last().unwrap().time_ms;
            let out = statistic_data(&trades, 1, n, now).unwrap();

            for slot in &out {
                let sum = slot.buy_volume_percentage + slot.sell_volume_percentage;
                prop_assert!(sum == 0 || (99..=101).contains(&sum), "sum = {}", sum);
            }
        }

        #[test]
        fn price_change_follows_previous_slot(trades in arb_trades(), n in 2usize..20) {
            let now = trades.last().unwrap().time_ms;
            let out = statistic_data(&trades, 1, n, now).unwrap();

            for k in 1..out.len() {
                let (prev, cur) = (&out[k - 1], &out[k]);
                if prev.avg_price > 0.0 && cur.avg_price > 0.0 {
                    let expected = (100.0 * (cur.avg_price - prev.avg_price) / prev.avg_price).round() as i64;
                    prop_assert_eq!(cur.price_change_percentage, expected);
                }
            }
        }

        #[test]
        fn repeated_runs_are_identical(trades in arb_trades(), n in 1usize..20) {
            let now = trades.last().unwrap().time_ms;
            let a = statistic_data(&trades, 1, n, now);
            let b = statistic_data(&trades, 1, n, now);
            prop_assert_eq!(a, b);
        }
    }
}
