//! Gram-style second-moment statistics.

/// Gram matrix `F·Fᵗ / n` of feature rows of equal length `n`.
///
/// Returns a row-major `k×k` matrix for `k` feature rows. For a single luma
/// channel this collapses to one value: the mean squared intensity.
pub fn gram_matrix(features: &[&[f64]]) -> Vec<f64> {
    let k = features.len();
    let n = features.first().map(|f| f.len()).unwrap_or(0);
    if n == 0 {
        return vec![0.0; k * k];
    }

    let mut gram = vec![0.0; k * k];
    for i in 0..k {
        for j in i..k {
            let dot: f64 = features[i]
                .iter()
                .zip(features[j].iter())
                .map(|(a, b)| a * b)
                .sum();
            let v = dot / n as f64;
            gram[i * k + j] = v;
            gram[j * k + i] = v;
        }
    }
    gram
}
