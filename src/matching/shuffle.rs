//! Fisher-Yates shuffle driven by a single entropy draw.

use std::sync::Arc;

use super::entropy::EntropySource;

/// Permutes sequences using [`EntropySource`].
#[derive(Debug, Clone)]
pub struct Shuffler {
    entropy: Arc<EntropySource>,
}

impl Shuffler {
    /// Creates a shuffler over `entropy`.
    #[must_use]
    pub fn new(entropy: Arc<EntropySource>) -> Self {
        Self { entropy }
    }

    /// Returns the elements of `items` in a uniformly random order.
    ///
    /// Draws `n` integers in `[0, n-1]` up front (one entropy round trip),
    /// then for `i` from `n-1` down to `1` swaps `i` with `draws[i] % (i+1)`.
    pub async fn shuffle<T: Send>(&self, mut items: Vec<T>) -> Vec<T> {
        let n = items.len();
        if n <= 1 {
            return items;
        }
        let max = u64::try_from(n - 1).unwrap_or(u64::MAX);
        // min == 0 <= max, so the range is never inverted.
        let draws = self.entropy.draw(n, 0, max).await.unwrap_or_default();
        permute(&mut items, &draws);
        items
    }
}

/// Applies the Fisher-Yates swaps for `draws` to `items` in place.
///
/// Missing draws leave the corresponding position untouched.
pub fn permute<T>(items: &mut [T], draws: &[u64]) {
    for i in (1..items.len()).rev() {
        let Some(&draw) = draws.get(i) else {
            continue;
        };
        let bound = u64::try_from(i + 1).unwrap_or(u64::MAX);
        let j = usize::try_from(draw % bound).unwrap_or(i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn permute_follows_draws() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        // i=3: 0%4=0 swap(3,0) -> d b c a
        // i=2: 5%3=2 swap(2,2) -> d b c a
        // i=1: 1%2=1 swap(1,1) -> d b c a
        permute(&mut items, &[0, 1, 5, 0]);
        assert_eq!(items, ['d', 'b', 'c', 'a']);
    }

    #[tokio::test]
    async fn shuffle_is_a_permutation() {
        let shuffler = Shuffler::new(Arc::new(EntropySource::local()));
        for n in 0..40u32 {
            let input: Vec<u32> = (0..n).collect();
            let output = shuffler.shuffle(input.clone()).await;
            assert_eq!(output.len(), input.len());
            assert_eq!(sorted(output), input);
        }
    }

    #[tokio::test]
    async fn single_element_is_untouched() {
        let shuffler = Shuffler::new(Arc::new(EntropySource::local()));
        assert_eq!(shuffler.shuffle(vec!["only"]).await, ["only"]);
    }
}
