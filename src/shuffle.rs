//! Variety without losing the strongest matches.

use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle everything after the first `head` entries, uniformly.
///
/// The head keeps its rank order. A list no longer than `head` is left
/// untouched.
pub fn partial_shuffle<T, R>(items: &mut [T], head: usize, rng: &mut R)
where
    R: Rng + ?Sized,
{
    if items.len() <= head {
        return;
    }
    items[head..].shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_head_is_stable() {
        let ranked: Vec<u32> = (0..40).collect();
        for seed in 0..20 {
            let mut items = ranked.clone();
            partial_shuffle(&mut items, 5, &mut StdRng::seed_from_u64(seed));
            assert_eq!(&items[..5], &ranked[..5]);
        }
    }

    #[test]
    fn test_tail_is_permutation() {
        let ranked: Vec<u32> = (0..40).collect();
        let mut items = ranked.clone();
        partial_shuffle(&mut items, 3, &mut StdRng::seed_from_u64(7));

        let mut tail = items[3..].to_vec();
        tail.sort_unstable();
        assert_eq!(tail, ranked[3..].to_vec());
        // 37! orderings; identity would mean the tail was never touched.
        assert_ne!(items, ranked);
    }

    #[test]
    fn test_short_list_is_all_head() {
        let mut items = vec![1, 2, 3];
        partial_shuffle(&mut items, 5, &mut StdRng::seed_from_u64(1));
        assert_eq!(items, vec![1, 2, 3]);

        let mut exact = vec![1, 2, 3];
        partial_shuffle(&mut exact, 3, &mut StdRng::seed_from_u64(1));
        assert_eq!(exact, vec![1, 2, 3]);
    }
}
