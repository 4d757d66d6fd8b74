//! Class rebalancing for one-hot labeled datasets
//!
//! The minority class is replicated verbatim an integer number of times
//! (capped by a skew-tolerance constant), then the larger class is decimated
//! with a fixed stride, and the result is shuffled. Strides come from
//! truncating division, so a non-integer ratio is under-corrected.

use super::{check_parallel, DataError, DataResult};
use crate::models::{SystemData, NEGATIVE, POSITIVE};
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;

/// Row indices of class 1 (column 0 set) and class 2 (column 1 set)
fn class_indices(labels: &DMatrix<f64>) -> DataResult<(Vec<usize>, Vec<usize>)> {
    if labels.ncols() != 2 {
        return Err(DataError::NotOneHot(labels.ncols()));
    }
    let class1: Vec<usize> = (0..labels.nrows()).filter(|&i| labels[(i, 0)] != 0.0).collect();
    let class2: Vec<usize> = (0..labels.nrows()).filter(|&i| labels[(i, 1)] != 0.0).collect();

    if class1.is_empty() {
        return Err(DataError::EmptyClass(1));
    }
    if class2.is_empty() {
        return Err(DataError::EmptyClass(2));
    }
    Ok((class1, class2))
}

/// Rows of `instances` at `class1` then `class2`, with fresh one-hot labels
fn gather(
    instances: &DMatrix<f64>,
    class1: &[usize],
    class2: &[usize],
) -> (DMatrix<f64>, DMatrix<f64>) {
    let order: Vec<usize> = class1.iter().chain(class2.iter()).copied().collect();
    let x = instances.select_rows(order.iter());
    let y = DMatrix::from_fn(order.len(), 2, |i, j| {
        if i < class1.len() {
            POSITIVE[j]
        } else {
            NEGATIVE[j]
        }
    });
    (x, y)
}

/// Oversample the minority class, then undersample and shuffle.
///
/// With `ratio = |class1| / |class2|`, the minority is appended to itself
/// `int(constant)` more times when `ratio` or `1/ratio` exceeds `constant`,
/// otherwise `int(max(ratio, 1/ratio))` more times.
pub fn rebalance<R: Rng + ?Sized>(
    constant: f64,
    instances: &DMatrix<f64>,
    labels: &DMatrix<f64>,
    rng: &mut R,
) -> DataResult<(DMatrix<f64>, DMatrix<f64>)> {
    check_parallel(instances.nrows(), labels.nrows())?;
    let (class1, class2) = class_indices(labels)?;

    let class1_is_minority = class1.len() < class2.len();
    let (minority, majority) = if class1_is_minority {
        (&class1, &class2)
    } else {
        (&class2, &class1)
    };

    let skew = majority.len() as f64 / minority.len() as f64;
    let alpha = if skew > constant {
        constant.max(0.0) as usize
    } else {
        majority.len() / minority.len()
    };

    let replicated: Vec<usize> = minority
        .iter()
        .cycle()
        .take(minority.len() * (alpha + 1))
        .copied()
        .collect();

    tracing::debug!(
        "Rebalancing {} vs {} instances: minority replicated {} more times",
        class1.len(),
        class2.len(),
        alpha
    );

    let (x, y) = if class1_is_minority {
        gather(instances, &replicated, majority)
    } else {
        gather(instances, majority, &replicated)
    };
    rebalance_by_removing(&x, &y, rng)
}

/// Undersample the larger class by keeping every `int(larger / smaller)`-th row, then shuffle.
pub fn rebalance_by_removing<R: Rng + ?Sized>(
    instances: &DMatrix<f64>,
    labels: &DMatrix<f64>,
    rng: &mut R,
) -> DataResult<(DMatrix<f64>, DMatrix<f64>)> {
    check_parallel(instances.nrows(), labels.nrows())?;
    let (mut class1, mut class2) = class_indices(labels)?;

    if class1.len() < class2.len() {
        let rate = class2.len() / class1.len();
        class2 = class2.into_iter().step_by(rate).collect();
    } else {
        let rate = class1.len() / class2.len();
        class1 = class1.into_iter().step_by(rate).collect();
    }

    let (x, y) = gather(instances, &class1, &class2);
    shuffle(&x, &y, rng)
}

/// Apply one uniform random permutation to the rows of both matrices
pub fn shuffle<R: Rng + ?Sized>(
    instances: &DMatrix<f64>,
    labels: &DMatrix<f64>,
    rng: &mut R,
) -> DataResult<(DMatrix<f64>, DMatrix<f64>)> {
    check_parallel(instances.nrows(), labels.nrows())?;

    let mut idx: Vec<usize> = (0..instances.nrows()).collect();
    idx.shuffle(rng);

    Ok((instances.select_rows(idx.iter()), labels.select_rows(idx.iter())))
}

/// Cut into `parts` consecutive sections of `len / parts` rows; the last takes the remainder.
pub fn split(
    instances: &DMatrix<f64>,
    labels: &DMatrix<f64>,
    parts: usize,
) -> DataResult<(Vec<DMatrix<f64>>, Vec<DMatrix<f64>>)> {
    check_parallel(instances.nrows(), labels.nrows())?;
    if parts == 0 {
        return Err(DataError::InvalidSplit {
            len: instances.nrows(),
            parts,
        });
    }

    let length = instances.nrows() / parts;
    let mut xs = Vec::with_capacity(parts);
    let mut ys = Vec::with_capacity(parts);
    for i in 0..parts {
        let start = i * length;
        let count = if i + 1 == parts {
            instances.nrows() - start
        } else {
            length
        };
        xs.push(instances.rows(start, count).into_owned());
        ys.push(labels.rows(start, count).into_owned());
    }
    Ok((xs, ys))
}

/// [`rebalance`] applied to the features and labels of one system
pub fn rebalance_system<R: Rng + ?Sized>(
    constant: f64,
    data: &SystemData,
    rng: &mut R,
) -> DataResult<SystemData> {
    let (features, labels) = rebalance(constant, &data.features, &data.labels, rng)?;
    tracing::info!(
        "Rebalanced {}: {} -> {} instances",
        data.name,
        data.len(),
        features.nrows()
    );
    Ok(SystemData {
        name: data.name.clone(),
        features,
        constants: data.constants,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// `positives` smells followed by `negatives` clean rows; column 0 holds the row index
    fn dataset(positives: usize, negatives: usize) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = positives + negatives;
        let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { i as f64 } else { -(i as f64) });
        let y = DMatrix::from_fn(n, 2, |i, j| {
            if i < positives {
                POSITIVE[j]
            } else {
                NEGATIVE[j]
            }
        });
        (x, y)
    }

    fn counts(y: &DMatrix<f64>) -> (usize, usize) {
        let c1 = y.column(0).iter().filter(|&&v| v != 0.0).count();
        (c1, y.nrows() - c1)
    }

    #[test]
    fn test_rebalance_caps_replication() {
        let (x, y) = dataset(10, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (bx, by) = rebalance(3.0, &x, &y, &mut rng).unwrap();

        assert_eq!(bx.nrows(), by.nrows());
        // 10 smells replicated 3 more times, 100 clean rows strided by int(100/40) = 2
        assert_eq!(counts(&by), (40, 50));

        let ratio = 40.0 / 50.0;
        assert!(ratio >= 1.0 / 3.0 && ratio <= 3.0);
    }

    #[test]
    fn test_rebalance_keeps_rows_paired_with_labels() {
        let (x, y) = dataset(10, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (bx, by) = rebalance(3.0, &x, &y, &mut rng).unwrap();
        for i in 0..bx.nrows() {
            let original = bx[(i, 0)] as usize;
            assert_eq!(by[(i, 0)], y[(original, 0)]);
            assert_eq!(bx[(i, 1)], -(original as f64));
        }
    }

    #[test]
    fn test_rebalance_mild_skew_uses_ratio() {
        // ratio 2 < constant 5: minority replicated int(2) = 2 more times
        let (x, y) = dataset(20, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (_, by) = rebalance(5.0, &x, &y, &mut rng).unwrap();
        // 30 clean vs 20 smells: the clean rows are strided by int(30/20) = 1
        assert_eq!(counts(&by), (20, 30));
    }

    #[test]
    fn test_rebalance_balanced_input() {
        let (x, y) = dataset(5, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (_, by) = rebalance(3.0, &x, &y, &mut rng).unwrap();
        // clean rows doubled to 10, then strided by 2 back to 5
        assert_eq!(counts(&by), (5, 5));
    }

    #[test]
    fn test_rebalance_is_reproducible_with_seed() {
        let (x, y) = dataset(10, 100);
        let a = rebalance(3.0, &x, &y, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        let b = rebalance(3.0, &x, &y, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rebalance_empty_class() {
        let (x, y) = dataset(0, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(rebalance(3.0, &x, &y, &mut rng), Err(DataError::EmptyClass(1))));
        let (x, y) = dataset(4, 0);
        assert!(matches!(rebalance(3.0, &x, &y, &mut rng), Err(DataError::EmptyClass(2))));
    }

    #[test]
    fn test_length_mismatch_fails_fast() {
        let (x, _) = dataset(3, 3);
        let (_, y) = dataset(3, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            shuffle(&x, &y, &mut rng),
            Err(DataError::LengthMismatch { instances: 6, labels: 7 })
        ));
        assert!(rebalance(3.0, &x, &y, &mut rng).is_err());
    }

    #[test]
    fn test_removing_strides_larger_class() {
        let (x, y) = dataset(3, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (_, by) = rebalance_by_removing(&x, &y, &mut rng).unwrap();
        // int(10/3) = 3: rows 0, 3, 6, 9 of the clean class survive
        assert_eq!(counts(&by), (3, 4));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let (x, y) = dataset(4, 6);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let (sx, sy) = shuffle(&x, &y, &mut rng).unwrap();
        let mut seen: Vec<usize> = sx.column(0).iter().map(|&v| v as usize).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(counts(&sy), (4, 6));
    }

    #[test]
    fn test_split_sections() {
        let (x, y) = dataset(3, 8);
        let (xs, ys) = split(&x, &y, 3).unwrap();
        let sizes: Vec<usize> = xs.iter().map(|m| m.nrows()).collect();
        assert_eq!(sizes, vec![3, 3, 5]);
        assert_eq!(ys[2].nrows(), 5);
        assert_eq!(xs[1][(0, 0)], 3.0);
        assert!(split(&x, &y, 0).is_err());
    }

    #[test]
    fn test_rebalance_system_keeps_constants() {
        let (x, y) = dataset(10, 100);
        let data = SystemData {
            name: "toy".into(),
            features: x,
            constants: [0.5, -1.0],
            labels: y,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let balanced = rebalance_system(3.0, &data, &mut rng).unwrap();
        assert_eq!(balanced.len(), 90);
        assert_eq!(balanced.constants, [0.5, -1.0]);
        assert_eq!(balanced.positives(), 40);
    }
}
