//! P0: period bookkeeping. Advances each tracked period granularity
//! (1m/5m/1h/4h/1d) forward from the last closed period as new blocks are
//! processed, independent of any pricing outcome -- a period with zero
//! swaps in it is still a period.

use crate::db::shared::{Period, PeriodType};

pub const TRACKED_PERIODS: [PeriodType; 5] =
    [PeriodType::OneMin, PeriodType::FiveMin, PeriodType::OneHour, PeriodType::FourHour, PeriodType::OneDay];

/// Given the last known period (or none) and the current chain head,
/// returns every period that should now exist, in order, up to and
/// including the one containing `head_block`/`head_time_unix`.
pub fn periods_to_open(
    period_type: PeriodType,
    last: Option<&Period>,
    head_block: i64,
    head_time_unix: i64,
) -> Vec<Period> {
    let duration = period_type.duration_secs();
    let mut opens = Vec::new();

    let mut next_open = match last {
        Some(p) if p.is_complete => p.time_close,
        Some(p) => p.time_open,
        None => floor_to_period(head_time_unix, duration),
    };

    while next_open <= head_time_unix {
        let next_close = next_open + duration;
        opens.push(Period {
            period_type,
            time_open: next_open,
            time_close: next_close,
            block_open: head_block,
            block_close: head_block,
            is_complete: next_close <= head_time_unix,
        });
        next_open = next_close;
    }

    opens
}

fn floor_to_period(t: i64, duration_secs: i64) -> i64 {
    t - t.rem_euclid(duration_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_periods_up_to_head_time() {
        let periods = periods_to_open(PeriodType::OneHour, None, 100, 3700);
        assert!(!periods.is_empty());
        assert!(periods.last().unwrap().time_open <= 3700);
    }
}
