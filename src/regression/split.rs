use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

/// Row positions for each side of a train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `rng` and hold out `ceil(test_fraction · n)` rows.
pub fn train_test_split<R: Rng>(n: usize, test_fraction: f64, rng: &mut R) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "{n} complete rows, need at least 2 to split"
        )));
    }
    // tolerance keeps 0.3 * 10 from rounding up to 4
    let n_test = (test_fraction * n as f64 - 1e-9).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < 1 || n_train < 1 {
        return Err(Error::InsufficientData(format!(
            "test_fraction {test_fraction} over {n} rows leaves {n_train} train / {n_test} test"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let train = order.split_off(n_test);
    Ok(Split { train, test: order })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn sizes_follow_fraction() {
        let mut rng = Pcg64::seed_from_u64(7);
        let split = train_test_split(10, 0.2, &mut rng).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let split = train_test_split(10, 0.3, &mut rng).unwrap();
        assert_eq!(split.test.len(), 3);
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let mut rng = Pcg64::seed_from_u64(1);
        let split = train_test_split(25, 0.25, &mut rng).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_split() {
        let a = train_test_split(50, 0.2, &mut Pcg64::seed_from_u64(42)).unwrap();
        let b = train_test_split(50, 0.2, &mut Pcg64::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let mut rng = Pcg64::seed_from_u64(0);
        assert!(matches!(
            train_test_split(10, 1.0, &mut rng),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            train_test_split(1, 0.5, &mut rng),
            Err(Error::InsufficientData(_))
        ));
        assert!(matches!(
            train_test_split(2, 0.9, &mut rng),
            Err(Error::InsufficientData(_))
        ));
    }
}
