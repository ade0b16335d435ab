//! Pairing of a shuffled participant list.

use super::shuffle::Shuffler;

/// Fewer than two participants were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient participants: {0}")]
pub struct InsufficientParticipants(pub usize);

/// A numbered pairing. `second == None` marks a lone pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing<T> {
    /// 1-based sequence number.
    pub number: u32,
    /// First member.
    pub first: T,
    /// Second member, absent for the odd one out.
    pub second: Option<T>,
}

/// Shuffles participants and walks them two at a time.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    shuffler: Shuffler,
}

impl MatchingEngine {
    /// Creates an engine over `shuffler`.
    #[must_use]
    pub fn new(shuffler: Shuffler) -> Self {
        Self { shuffler }
    }

    /// Produces `ceil(n/2)` pairings covering every participant once.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientParticipants`] when `n < 2`.
    pub async fn pair<T: Send>(
        &self,
        participants: Vec<T>,
    ) -> Result<Vec<Pairing<T>>, InsufficientParticipants> {
        if participants.len() < 2 {
            return Err(InsufficientParticipants(participants.len()));
        }
        let shuffled = self.shuffler.shuffle(participants).await;
        Ok(pair_in_order(shuffled))
    }
}

/// Pairs `items` in their given order; the last item of an odd-length list
/// becomes a lone pair that still takes the next number.
#[must_use]
pub fn pair_in_order<T>(items: Vec<T>) -> Vec<Pairing<T>> {
    let mut pairs = Vec::with_capacity(items.len().div_ceil(2));
    let mut iter = items.into_iter();
    let mut number = 1u32;
    while let Some(first) = iter.next() {
        pairs.push(Pairing {
            number,
            first,
            second: iter.next(),
        });
        number = number.saturating_add(1);
    }
    pairs
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::matching::entropy::EntropySource;
    use crate::matching::entropy::tests::FailingSource;

    fn engine() -> MatchingEngine {
        MatchingEngine::new(Shuffler::new(Arc::new(EntropySource::local())))
    }

    #[test]
    fn pairs_in_order_with_lone_tail() {
        let pairs = pair_in_order(vec![1, 2, 3]);
        assert_eq!(
            pairs,
            [
                Pairing { number: 1, first: 1, second: Some(2) },
                Pairing { number: 2, first: 3, second: None },
            ]
        );
    }

    #[tokio::test]
    async fn rejects_fewer_than_two() {
        assert_eq!(engine().pair(vec![1]).await, Err(InsufficientParticipants(1)));
        assert_eq!(engine().pair(Vec::<u8>::new()).await, Err(InsufficientParticipants(0)));
    }

    #[tokio::test]
    async fn covers_every_participant_once() {
        let engine = engine();
        for n in 2..30usize {
            let Ok(pairs) = engine.pair((0..n).collect()).await else {
                panic!("pairing failed for {n}");
            };
            assert_eq!(pairs.len(), n.div_ceil(2));
            assert_eq!(pairs.iter().filter(|p| p.second.is_none()).count(), n % 2);

            let numbers: Vec<u32> = pairs.iter().map(|p| p.number).collect();
            let expected: Vec<u32> = (1..=u32::try_from(pairs.len()).unwrap_or(0)).collect();
            assert_eq!(numbers, expected);

            let seen: HashSet<usize> = pairs
                .iter()
                .flat_map(|p| std::iter::once(p.first).chain(p.second))
                .collect();
            assert_eq!(seen.len(), n);
        }
    }

    #[tokio::test]
    async fn succeeds_when_remote_entropy_always_fails() {
        let source = EntropySource::new(
            Arc::new(FailingSource::default()),
            std::time::Duration::from_millis(100),
        );
        let engine = MatchingEngine::new(Shuffler::new(Arc::new(source)));
        let Ok(pairs) = engine.pair(vec!["a", "b", "c", "d", "e"]).await else {
            panic!("pairing failed");
        };
        assert_eq!(pairs.len(), 3);
    }
}
