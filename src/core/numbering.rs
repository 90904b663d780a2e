use std::collections::BTreeSet;

/// 回傳下一個可用的場地號碼
///
/// Scans the closed range between the smallest and largest number in use and
/// returns the first gap; without a gap the next number after the largest.
/// Freeing a number is simply leaving it out of `existing` on the next call.
pub fn next_number<I>(existing: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    let used: BTreeSet<u32> = existing.into_iter().filter(|n| *n > 0).collect();

    let (Some(&min), Some(&max)) = (used.first(), used.last()) else {
        return 1;
    };

    (min..=max)
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_starts_at_one() {
        assert_eq!(next_number(Vec::<u32>::new()), 1);
    }

    #[test]
    fn test_reuses_lowest_hole() {
        assert_eq!(next_number([1, 2, 4]), 3);
        assert_eq!(next_number([4, 1, 2, 6]), 3);
    }

    #[test]
    fn test_contiguous_appends() {
        assert_eq!(next_number([1, 2, 3]), 4);
        assert_eq!(next_number([3, 2, 1]), 4);
    }

    #[test]
    fn test_scan_starts_at_smallest_in_use() {
        assert_eq!(next_number([3, 4]), 5);
        assert_eq!(next_number([2]), 3);
    }

    #[test]
    fn test_duplicates_and_zero_are_ignored() {
        assert_eq!(next_number([1, 1, 3]), 2);
        assert_eq!(next_number([0]), 1);
    }
}
