use std::collections::HashMap;

/// Term -> TF-IDF weight.
pub type SparseVector = HashMap<String, f64>;

/// Floor applied to vector norms before they are used as divisors.
pub const NORM_EPSILON: f64 = 1e-9;

/// Sublinear term-frequency weight: `1 + ln(tf)`, or 0 when the term is absent.
#[inline]
pub fn tf_weight(tf: u32) -> f64 {
    if tf > 0 { 1.0 + (tf as f64).ln() } else { 0.0 }
}

pub fn l2_norm(v: &SparseVector) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

pub fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    // iterate the smaller side
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|x| w * x))
        .sum()
}

/// Cosine similarity; zero whenever either vector has (near) zero norm.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let na = l2_norm(a);
    let nb = l2_norm(b);
    if na < NORM_EPSILON || nb < NORM_EPSILON {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}
