//! Similarity and distance metrics for embeddings

/// Squared Euclidean distance between two embedding vectors
///
/// This is the only metric the index ranks by. For unit vectors it lies in
/// `[0.0, 4.0]` and equals `2 - 2 * cosine`.
///
/// # Panics
/// Panics if vectors have different dimensions
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have same dimension: {} vs {}",
        a.len(),
        b.len()
    );

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// L2 normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    vec.iter_mut().for_each(|x| *x /= norm);
}

/// Convert a squared Euclidean distance between unit vectors into a
/// confidence score in `[0.0, 1.0]`.
///
/// `d = 2 - 2c` for unit vectors, so `1 - d/2` recovers the cosine `c`;
/// negative cosines clamp to 0.
pub fn distance_to_confidence(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_squared_euclidean_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert_eq!(squared_euclidean(&a, &a), 0.0);
    }

    #[test]
    fn test_squared_euclidean_is_not_rooted() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![3.0, 4.0, 0.0];
        assert_relative_eq!(squared_euclidean(&a, &b), 25.0, epsilon = 1e-6);
    }

    #[test]
    fn test_confidence_tracks_dot_product_for_unit_vectors() {
        let mut a = vec![0.3, -1.2, 0.8, 2.0];
        let mut b = vec![1.1, 0.4, -0.5, 0.9];
        l2_normalize(&mut a);
        l2_normalize(&mut b);

        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let d = squared_euclidean(&a, &b);
        assert_relative_eq!(d, 2.0 - 2.0 * dot, epsilon = 1e-5);
        assert_relative_eq!(distance_to_confidence(d), dot.max(0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_distance_to_confidence_clamps() {
        assert_eq!(distance_to_confidence(0.0), 1.0);
        assert_relative_eq!(distance_to_confidence(1.0), 0.5);
        assert_eq!(distance_to_confidence(2.0), 0.0);
        // Opposite unit vectors
        assert_eq!(distance_to_confidence(4.0), 0.0);
        // Float noise just below zero distance
        assert_eq!(distance_to_confidence(-1e-7), 1.0);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut zero = vec![0.0; 4];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 4]);
    }

    #[test]
    #[should_panic(expected = "Vectors must have same dimension")]
    fn test_squared_euclidean_different_dimensions() {
        squared_euclidean(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
    }
}
