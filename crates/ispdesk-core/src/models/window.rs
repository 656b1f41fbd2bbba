//! Effective-dated windows
//!
//! Prices, discounts and exchange rates are valid over a time window
//! `[effective_from, effective_to]`. The end bound is inclusive: a row closed
//! at `t - 1s` hands over to a row starting at `t` without a gap.

use chrono::{DateTime, Duration, Utc};

/// A record that is valid over a bounded (or open-ended) time window
pub trait EffectiveDated {
    /// Start of the window
    fn effective_from(&self) -> DateTime<Utc>;

    /// End of the window (None = open-ended)
    fn effective_to(&self) -> Option<DateTime<Utc>>;

    /// Whether the row is switched on at all
    fn is_active(&self) -> bool {
        true
    }

    /// Check if the row applies at `at`
    fn is_current_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active()
            && self.effective_from() <= at
            && self.effective_to().map_or(true, |to| at <= to)
    }

    /// Check if the row only starts after `at`
    fn is_future_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active() && self.effective_from() > at
    }

    /// Check if the row has no end date
    fn is_open_ended(&self) -> bool {
        self.effective_to().is_none()
    }

    /// Check if the row's window intersects `[from, to]`
    fn overlaps(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> bool {
        windows_overlap(self.effective_from(), self.effective_to(), from, to)
    }
}

/// Check if two inclusive windows intersect (None = unbounded end)
pub fn windows_overlap(
    a_from: DateTime<Utc>,
    a_to: Option<DateTime<Utc>>,
    b_from: DateTime<Utc>,
    b_to: Option<DateTime<Utc>>,
) -> bool {
    let a_starts_before_b_ends = b_to.map_or(true, |end| a_from <= end);
    let b_starts_before_a_ends = a_to.map_or(true, |end| b_from <= end);
    a_starts_before_b_ends && b_starts_before_a_ends
}

/// End bound for a row that is superseded by one starting at `next_from`
#[inline]
pub fn close_before(next_from: DateTime<Utc>) -> DateTime<Utc> {
    next_from - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    struct Window {
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
        active: bool,
    }

    impl EffectiveDated for Window {
        fn effective_from(&self) -> DateTime<Utc> {
            self.from
        }

        fn effective_to(&self) -> Option<DateTime<Utc>> {
            self.to
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_current_window_bounds_are_inclusive() {
        let w = Window {
            from: ts(0),
            to: Some(ts(100)),
            active: true,
        };
        assert!(!w.is_current_at(ts(-1)));
        assert!(w.is_current_at(ts(0)));
        assert!(w.is_current_at(ts(100)));
        assert!(!w.is_current_at(ts(101)));
    }

    #[test]
    fn test_inactive_row_is_never_current() {
        let w = Window {
            from: ts(0),
            to: None,
            active: false,
        };
        assert!(!w.is_current_at(ts(10)));
        assert!(!w.is_future_at(ts(-10)));
    }

    #[test]
    fn test_future_window() {
        let w = Window {
            from: ts(50),
            to: None,
            active: true,
        };
        assert!(w.is_future_at(ts(49)));
        assert!(!w.is_future_at(ts(50)));
        assert!(w.is_open_ended());
    }

    #[test]
    fn test_close_before_leaves_no_gap() {
        let previous = Window {
            from: ts(0),
            to: Some(close_before(ts(60))),
            active: true,
        };
        let next = Window {
            from: ts(60),
            to: None,
            active: true,
        };
        assert!(previous.is_current_at(ts(59)));
        assert!(!previous.is_current_at(ts(60)));
        assert!(next.is_current_at(ts(60)));
        assert!(!previous.overlaps(next.from, next.to));
    }

    #[test]
    fn test_open_ended_windows_always_overlap_later_starts() {
        assert!(windows_overlap(ts(0), None, ts(1000), None));
        assert!(windows_overlap(ts(1000), None, ts(0), Some(ts(1000))));
        assert!(!windows_overlap(ts(1001), None, ts(0), Some(ts(1000))));
    }

    proptest! {
        #[test]
        fn prop_overlap_is_symmetric(
            a in 0i64..10_000, a_len in proptest::option::of(0i64..5_000),
            b in 0i64..10_000, b_len in proptest::option::of(0i64..5_000),
        ) {
            let a_to = a_len.map(|l| ts(a + l));
            let b_to = b_len.map(|l| ts(b + l));
            prop_assert_eq!(
                windows_overlap(ts(a), a_to, ts(b), b_to),
                windows_overlap(ts(b), b_to, ts(a), a_to)
            );
        }

        #[test]
        fn prop_shared_instant_implies_overlap(
            a in 0i64..10_000, a_len in 0i64..5_000,
            b in 0i64..10_000, b_len in 0i64..5_000,
            instant in 0i64..15_000,
        ) {
            let wa = Window { from: ts(a), to: Some(ts(a + a_len)), active: true };
            let wb = Window { from: ts(b), to: Some(ts(b + b_len)), active: true };
            if wa.is_current_at(ts(instant)) && wb.is_current_at(ts(instant)) {
                prop_assert!(wa.overlaps(wb.from, wb.to));
            }
        }
    }
}
