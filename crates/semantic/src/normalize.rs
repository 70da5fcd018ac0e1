/// Fit a backend-native vector to `target_dim`.
///
/// Shorter vectors are right-padded with zeros. Longer vectors are truncated to their first
/// `target_dim` components; this is lossy on purpose so that a model with a wider output can
/// still query an index built for a narrower one.
pub fn adapt_dimension(mut v: Vec<f32>, target_dim: usize) -> Vec<f32> {
    if v.len() != target_dim {
        v.resize(target_dim, 0.0);
    }
    v
}

/// In-place L2 normalization helper to keep allocations down during hot paths.
pub(crate) fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}
