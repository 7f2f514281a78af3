//! Fisher–Yates permutation over the injected RNG.

use narrator_core::rng::DeterministicRng;

/// Permutes `items` in place, `repeats` times (at least once).
///
/// Repeating does not improve fairness; it only exists because narrators
/// asked for "more shuffling".
pub fn permute<T>(items: &mut [T], repeats: u32, rng: &mut dyn DeterministicRng) {
    if items.len() < 2 {
        return;
    }
    for _ in 0..repeats.max(1) {
        for i in (1..items.len()).rev() {
            let upper = u32::try_from(i).unwrap_or(u32::MAX);
            let j = (rng.next_u32_range(0, upper) as usize).min(i);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrator_core::rng::SystemRng;
    use narrator_test_support::{MockRng, SequenceRng};

    #[test]
    fn test_permute_with_mock_rng_is_deterministic_rotation() {
        // MockRng always picks index 0, which rotates the slice left by one.
        let mut items = vec![1, 2, 3, 4];

        permute(&mut items, 1, &mut MockRng);

        assert_eq!(items, vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_permute_with_sequence_rng_swaps_as_scripted() {
        let mut items = vec!['a', 'b', 'c'];
        // i=2 -> j=2 (no-op), i=1 -> j=0 (swap a/b)
        let mut rng = SequenceRng::new(vec![2, 0]);

        permute(&mut items, 1, &mut rng);

        assert_eq!(items, vec!['b', 'a', 'c']);
    }

    #[test]
    fn test_permute_clamps_out_of_range_values() {
        let mut items = vec![1, 2];
        let mut rng = SequenceRng::new(vec![99]);

        permute(&mut items, 1, &mut rng);

        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_permute_preserves_elements_across_repeats() {
        let mut rng = SystemRng::seeded(11);
        let mut items: Vec<u32> = (1..=10).collect();

        permute(&mut items, 5, &mut rng);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=10).collect::<Vec<_>>());
    }
}
