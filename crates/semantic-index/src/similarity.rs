/// Cosine similarity of two equal-length vectors.
///
/// Accumulates in `f64` and clamps to `[-1.0, 1.0]`. Returns `0.0` when either
/// vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine_similarity on unequal lengths");

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 || dot == 0.0 {
        return 0.0;
    }
    let score = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32;
    // A tiny negative cosine can round to -0.0, which total_cmp orders below 0.0.
    if score == 0.0 { 0.0 } else { score }
}
