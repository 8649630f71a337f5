use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};

/// Upper bound on the group count accepted by [`allocate`]. Tenant quotas are
/// far lower; this only keeps a bogus count from sizing a huge vector.
pub const MAX_GROUP_COUNT: i64 = 1 << 20;

/// Split `total_targets` into `group_count` ordered groups.
///
/// Groups are filled left to right: step `i` takes
/// `round_half_up(remaining / (group_count - i))` of whatever the previous
/// steps left over. The last step's divisor is 1, so the sum always equals
/// `total_targets` without a final correction.
///
/// ```
/// assert_eq!(rg_core::allocate(10, 4).unwrap(), vec![3, 2, 3, 2]);
/// ```
pub fn allocate(total_targets: i64, group_count: i64) -> CoreResult<Vec<i64>> {
    if group_count <= 0 {
        return StructError::from(CoreReason::InvalidInput)
            .with_detail(format!("group count must be > 0, got {group_count}"))
            .err();
    }
    if group_count > MAX_GROUP_COUNT {
        return StructError::from(CoreReason::InvalidInput)
            .with_detail(format!(
                "group count {group_count} exceeds the supported maximum of {MAX_GROUP_COUNT}"
            ))
            .err();
    }
    if total_targets < 0 {
        return StructError::from(CoreReason::InvalidInput)
            .with_detail(format!("total targets must be >= 0, got {total_targets}"))
            .err();
    }

    let mut counts = Vec::with_capacity(group_count as usize);
    let mut remaining = total_targets;
    for step in 0..group_count {
        let share = div_round_half_up(remaining, group_count - step);
        counts.push(share);
        remaining -= share;
    }
    debug_assert_eq!(remaining, 0);
    Ok(counts)
}

/// `round(n / d)` with halves rounded up, for `n >= 0` and `d > 0`.
pub(crate) fn div_round_half_up(n: i64, d: i64) -> i64 {
    let quotient = n / d;
    let rest = n % d;
    if rest >= d - rest { quotient + 1 } else { quotient }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_into_four() {
        assert_eq!(allocate(10, 4).unwrap(), vec![3, 2, 3, 2]);
    }

    #[test]
    fn hundred_into_three() {
        // 100/3 = 33.3 -> 33, 67/2 = 33.5 -> 34, 33/1 = 33
        assert_eq!(allocate(100, 3).unwrap(), vec![33, 34, 33]);
    }

    #[test]
    fn single_group_takes_everything() {
        for total in [0, 1, 7, 20_000, i64::MAX] {
            assert_eq!(allocate(total, 1).unwrap(), vec![total]);
        }
    }

    #[test]
    fn zero_targets() {
        assert_eq!(allocate(0, 5).unwrap(), vec![0; 5]);
    }

    #[test]
    fn more_groups_than_targets() {
        // 3/5 = 0.6 -> 1, 2/4 = 0.5 -> 1, 1/3 -> 0, 1/2 = 0.5 -> 1, 0
        assert_eq!(allocate(3, 5).unwrap(), vec![1, 1, 0, 1, 0]);
    }

    #[test]
    fn sum_and_length_invariants() {
        for total in 0..=250 {
            for groups in 1..=40 {
                let counts = allocate(total, groups).unwrap();
                assert_eq!(counts.len(), groups as usize);
                assert_eq!(counts.iter().sum::<i64>(), total, "allocate({total}, {groups})");
                assert!(counts.iter().all(|c| *c >= 0));
            }
        }
    }

    #[test]
    fn groups_differ_by_at_most_one() {
        for (total, groups) in [(1_000_003, 7), (99, 10), (20_000, 500)] {
            let counts = allocate(total, groups).unwrap();
            let min = counts.iter().min().unwrap();
            let max = counts.iter().max().unwrap();
            assert!(max - min <= 1, "allocate({total}, {groups}) = {counts:?}");
        }
    }

    #[test]
    fn large_totals_do_not_overflow() {
        let counts = allocate(i64::MAX, 3).unwrap();
        assert_eq!(counts.iter().map(|c| *c as i128).sum::<i128>(), i64::MAX as i128);
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(allocate(10, 0).is_err());
        assert!(allocate(10, -2).is_err());
        assert!(allocate(-1, 3).is_err());
        assert!(allocate(10, MAX_GROUP_COUNT + 1).is_err());
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(div_round_half_up(5, 2), 3);
        assert_eq!(div_round_half_up(7, 3), 2);
        assert_eq!(div_round_half_up(8, 3), 3);
        assert_eq!(div_round_half_up(0, 9), 0);
        assert_eq!(div_round_half_up(i64::MAX, 2), i64::MAX / 2 + 1);
    }
}
