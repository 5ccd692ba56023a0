//! Cosine similarity over optional embeddings.
//!
//! Missing, empty, zero-magnitude or length-mismatched vectors are treated as
//! dissimilar (0.0) rather than raising.

use uuid::Uuid;

use crate::constants::EPSILON;
use crate::thought::Thought;

/// `dot / (‖a‖·‖b‖)`, clamped to [-1, 1]. Returns 0.0 when undefined.
pub fn cosine_similarity(a: Option<&[f64]>, b: Option<&[f64]>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < EPSILON || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Similarity between two thoughts' embeddings.
pub fn thought_similarity(a: &Thought, b: &Thought) -> f64 {
    cosine_similarity(a.embedding(), b.embedding())
}

/// Best match for `embedding` among `candidates`.
///
/// Ties keep the first candidate in iteration order. Returns `None` when
/// there are no candidates.
pub fn best_match<'a>(
    embedding: Option<&[f64]>,
    candidates: impl IntoIterator<Item = &'a Thought>,
) -> Option<(Uuid, f64)> {
    let mut best: Option<(Uuid, f64)> = None;
    for thought in candidates {
        let sim = cosine_similarity(embedding, thought.embedding());
        match best {
            Some((_, best_sim)) if sim <= best_sim => {}
            _ => best = Some((thought.id, sim)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn sim(a: &[f64], b: &[f64]) -> f64 {
        cosine_similarity(Some(a), Some(b))
    }

    #[test]
    fn test_identical_vectors() {
        let v = [0.3, -1.2, 4.0];
        assert_abs_diff_eq!(sim(&v, &v), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert_abs_diff_eq!(sim(&a, &b), 0.0);
    }

    #[test]
    fn test_opposite_vectors() {
        let a = [1.0, 2.0];
        let b = [-1.0, -2.0];
        assert_abs_diff_eq!(sim(&a, &b), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_embedding() {
        let a = [1.0, 2.0];
        assert_eq!(cosine_similarity(Some(&a[..]), None), 0.0);
        assert_eq!(cosine_similarity(None, Some(&a[..])), 0.0);
        assert_eq!(cosine_similarity(None, None), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(sim(&a, &b), 0.0);
    }

    #[test]
    fn test_empty_and_zero_vectors() {
        let empty: [f64; 0] = [];
        let zero = [0.0, 0.0];
        assert_eq!(sim(&empty, &empty), 0.0);
        assert_eq!(sim(&zero, &zero), 0.0);
    }

    #[test]
    fn test_best_match_first_wins_ties() {
        let a = Thought::builder("a").embedding(vec![1.0, 0.0]).build();
        let b = Thought::builder("b").embedding(vec![2.0, 0.0]).build();
        let c = Thought::builder("c").embedding(vec![0.0, 1.0]).build();
        let probe = [1.0, 0.0];

        let (id, score) = best_match(Some(&probe[..]), [&a, &b, &c]).unwrap();
        assert_eq!(id, a.id);
        assert_abs_diff_eq!(score, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_best_match_empty() {
        let probe = [1.0];
        assert!(best_match(Some(&probe[..]), std::iter::empty::<&Thought>()).is_none());
    }

    proptest! {
        #[test]
        fn prop_symmetric(v in prop::collection::vec(-10.0f64..10.0, 1..16),
                          w in prop::collection::vec(-10.0f64..10.0, 1..16)) {
            let ab = sim(&v, &w);
            let ba = sim(&w, &v);
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((-1.0..=1.0).contains(&ab));
        }

        #[test]
        fn prop_self_similarity_is_one(v in prop::collection::vec(-10.0f64..10.0, 1..16)) {
            prop_assume!(v.iter().any(|x| x.abs() > 1e-3));
            let s = sim(&v, &v);
            prop_assert!((s - 1.0).abs() < 1e-9);
        }
    }
}
