use rand::RngCore;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{PdpError, Result};

/// Byte length of a generated challenge coefficient.
pub const COEFFICIENT_LEN: usize = 20;

/// One spot check: block `index` weighted by `coefficient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeElement {
    pub index: usize,
    /// Big-endian integer, interpreted in the active domain.
    #[serde(with = "hex")]
    pub coefficient: Vec<u8>,
}

/// Challenge tuples of one round, applied identically to every file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSet {
    pub elements: Vec<ChallengeElement>,
}

impl ChallengeSet {
    pub fn new(elements: Vec<ChallengeElement>) -> Self {
        Self { elements }
    }

    /// Build from the parallel index and random lists published for a round.
    pub fn from_chain(indices: &[u32], randoms: &[Vec<u8>]) -> Result<Self> {
        if indices.len() != randoms.len() {
            return Err(PdpError::Encoding(format!(
                "{} block indices but {} random values",
                indices.len(),
                randoms.len()
            )));
        }
        Ok(Self {
            elements: indices
                .iter()
                .zip(randoms)
                .map(|(&i, v)| ChallengeElement {
                    index: i as usize,
                    coefficient: v.clone(),
                })
                .collect(),
        })
    }

    // Generate a random challenge: pick `count` distinct indices and coefficients
    pub fn random(block_count: usize, count: usize) -> Self {
        let mut rng = OsRng;
        let indices: Vec<usize> = (0..block_count).collect();
        let elements = indices
            .choose_multiple(&mut rng, count)
            .map(|&index| {
                let mut coefficient = vec![0u8; COEFFICIENT_LEN];
                rng.fill_bytes(&mut coefficient);
                ChallengeElement { index, coefficient }
            })
            .collect();
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChallengeElement> {
        self.elements.iter()
    }

    /// Indices in the chain's `u32` form; fails if one does not fit.
    pub fn indices(&self) -> Result<Vec<u32>> {
        self.elements
            .iter()
            .map(|e| {
                u32::try_from(e.index).map_err(|_| {
                    PdpError::Encoding(format!("block index {} exceeds the chain range", e.index))
                })
            })
            .collect()
    }

    pub fn coefficients(&self) -> Vec<Vec<u8>> {
        self.elements.iter().map(|e| e.coefficient.clone()).collect()
    }

    /// Largest challenged index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.elements.iter().map(|e| e.index).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_indices_distinct_and_bounded() {
        let c = ChallengeSet::random(20, 10);
        assert_eq!(c.len(), 10);
        let set: HashSet<_> = c.iter().map(|e| e.index).collect();
        assert_eq!(set.len(), 10);
        assert!(c.max_index().expect("non-empty") < 20);
        assert!(c.iter().all(|e| e.coefficient.len() == COEFFICIENT_LEN));
    }

    #[test]
    fn test_random_caps_at_block_count() {
        assert_eq!(ChallengeSet::random(3, 10).len(), 3);
    }

    #[test]
    fn test_from_chain() {
        let c = ChallengeSet::from_chain(&[4, 1], &[vec![1, 2], vec![3]]).expect("challenge");
        assert_eq!(c.indices().expect("indices"), vec![4, 1]);
        assert_eq!(c.coefficients(), vec![vec![1, 2], vec![3]]);
        assert!(ChallengeSet::from_chain(&[4, 1], &[vec![1]]).is_err());
    }

    #[test]
    fn test_indices_beyond_chain_range_rejected() {
        let Ok(wide) = usize::try_from(u64::from(u32::MAX) + 1) else {
            return;
        };
        let at_max = ChallengeSet::new(vec![ChallengeElement {
            index: u32::MAX as usize,
            coefficient: vec![1],
        }]);
        assert_eq!(at_max.indices().expect("indices"), vec![u32::MAX]);

        let c = ChallengeSet::new(vec![
            ChallengeElement {
                index: 2,
                coefficient: vec![1],
            },
            ChallengeElement {
                index: wide,
                coefficient: vec![2],
            },
        ]);
        assert!(matches!(c.indices(), Err(PdpError::Encoding(_))));
    }

    #[test]
    fn test_json_uses_hex_coefficients() {
        let c = ChallengeSet::from_chain(&[7], &[vec![0xab, 0xcd]]).expect("challenge");
        let json = serde_json::to_string(&c).expect("encode");
        assert!(json.contains("\"abcd\""));
        let back: ChallengeSet = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, c);
    }
}
