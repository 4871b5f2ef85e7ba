//! Cosine scoring and the deterministic top-k ordering shared by every store.

use std::cmp::Ordering;

use crate::types::SearchHit;

/// `(u·v) / (‖u‖‖v‖)`; a zero vector scores 0 against anything.
///
/// Callers check dimensions first; extra trailing components are ignored.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f32 {
    let mut dot = 0f64;
    let mut norm_u = 0f64;
    let mut norm_v = 0f64;
    for (a, b) in u.iter().zip(v) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }
    if norm_u == 0.0 || norm_v == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_u.sqrt() * norm_v.sqrt());
    score.clamp(-1.0, 1.0) as f32
}

/// Descending score, then ascending id.
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Sort candidates and keep the best `k`.
pub fn top_k(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(compare_hits);
    hits.truncate(k);
    hits
}
