//! Vector math over embedding vectors.

/// Cosine similarity for f32 embedding vectors, accumulated in f64.
///
/// Returns 0.0 for zero-norm inputs and for vectors of different length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance, `1 - similarity`, as used by the clustering `eps`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vector(rng: &mut StdRng, dims: usize) -> Vec<f32> {
        (0..dims).map(|_| rng.random_range(-1.0f32..1.0)).collect()
    }

    #[test]
    fn cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &d), 0.0);
    }

    #[test]
    fn cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn random_high_dimensional_vectors_are_nearly_orthogonal() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut total = 0.0;
        for seed in 0..20u64 {
            let a = random_vector(&mut rng, 1536);
            let b = random_vector(&mut rng, 1536);
            let sim = cosine_similarity(&a, &b);
            assert!(sim.abs() < 0.15, "seed {seed}: {sim}");
            total += sim;
        }
        // No systematic bias in either direction.
        assert!((total / 20.0).abs() < 0.05);
    }

    #[test]
    fn distance_is_complement_of_similarity() {
        let a = vec![1.0, 1.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
    }
}
