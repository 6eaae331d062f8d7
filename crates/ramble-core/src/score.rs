use rand::Rng;
use rand::seq::IndexedRandom;

use crate::context::ConversationContext;
use crate::token::TokenId;

/// Scoring seam for generated candidates. Both shipped evaluators return
/// uniform weight; the trait exists so a real relevance model can slot in
/// without touching the generation loop.
pub trait Evaluator {
    fn score(&self, candidate: &[TokenId], context: &ConversationContext, key: &str) -> f64;
}

/// Local relevance of a candidate against the input it answers.
pub struct LocalEvaluator;

impl Evaluator for LocalEvaluator {
    fn score(&self, _candidate: &[TokenId], _context: &ConversationContext, _key: &str) -> f64 {
        1.0
    }
}

/// Relevance of a candidate against the recent conversation history.
pub struct ContextEvaluator;

impl Evaluator for ContextEvaluator {
    fn score(&self, _candidate: &[TokenId], _context: &ConversationContext, _key: &str) -> f64 {
        1.0
    }
}

/// Blend the two evaluator scores: `bias` weighs the conversation signal,
/// `1 - bias` the local one.
pub fn blend(local: f64, conversation: f64, bias: f64) -> f64 {
    bias * conversation + (1.0 - bias) * local
}

/// Weighted-random pick of one candidate by blended score.
/// Returns `None` only for an empty candidate set.
pub fn select<'a>(
    candidates: &'a [(Vec<TokenId>, f64)],
    rng: &mut impl Rng,
) -> Option<&'a [TokenId]> {
    candidates
        .choose_weighted(rng, |(_, score)| score.max(f64::MIN_POSITIVE))
        .ok()
        .map(|(ids, _)| ids.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_placeholder_evaluators_are_uniform() {
        let ctx = ConversationContext::new(4);
        assert_eq!(LocalEvaluator.score(&[1, 2], &ctx, "chan"), 1.0);
        assert_eq!(ContextEvaluator.score(&[1, 2], &ctx, "chan"), 1.0);
    }

    #[test]
    fn test_blend_extremes() {
        assert_eq!(blend(2.0, 8.0, 0.0), 2.0);
        assert_eq!(blend(2.0, 8.0, 1.0), 8.0);
        assert!((blend(2.0, 8.0, 0.5) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_select_empty_is_none() {
        assert!(select(&[], &mut rng()).is_none());
    }

    #[test]
    fn test_select_single() {
        let candidates = vec![(vec![1, 2, 3], 1.0)];
        assert_eq!(select(&candidates, &mut rng()).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_select_zero_scores_still_pick() {
        // All-zero scores degrade to uniform rather than failing
        let candidates = vec![(vec![1], 0.0), (vec![2], 0.0)];
        assert!(select(&candidates, &mut rng()).is_some());
    }

    #[test]
    fn test_select_favors_heavy_candidate() {
        let candidates = vec![(vec![1], 1000.0), (vec![2], 0.001)];
        let mut rng = rng();
        let mut heavy = 0;
        for _ in 0..100 {
            if select(&candidates, &mut rng).unwrap() == [1] {
                heavy += 1;
            }
        }
        assert!(heavy > 90, "heavy candidate picked {heavy}/100 times");
    }
}
