use super::*;

#[test]
fn normalized_vector_has_unit_length() {
    let vector = normalize_l2(vec![3.0, 4.0]);
    assert!((vector[0] - 0.6).abs() < 1e-6);
    assert!((vector[1] - 0.8).abs() < 1e-6);

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[test]
fn zero_vector_is_left_alone() {
    assert_eq!(normalize_l2(vec![0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
}

#[test]
fn cosine_similarity_bounds() {
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_similarity_degenerate_inputs() {
    assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
    assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).abs() < f32::EPSILON);
    assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).abs() < f32::EPSILON);
}
