//! Binary Merkle tree over raw digests.

use trust_core::{HashAlgorithm, VectorEvent};

/// Leaf digest for one event: `digest("{vec_hash}:{payload_hash}")`.
pub fn leaf_hash(event: &VectorEvent, algo: HashAlgorithm) -> Vec<u8> {
    let material = format!("{}:{}", event.vec_hash, event.payload_hash);
    algo.digest(material.as_bytes())
}

/// Fold `leaves` pairwise into a single root.
///
/// Each parent is `digest(left || right)`. A layer with an odd number of
/// nodes pairs its last node with itself. Returns `None` for no leaves.
pub fn merkle_root(leaves: &[Vec<u8>], algo: HashAlgorithm) -> Option<Vec<u8>> {
    if leaves.is_empty() {
        return None;
    }

    let mut layer: Vec<Vec<u8>> = leaves.to_vec();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut buf = Vec::with_capacity(left.len() + right.len());
                buf.extend_from_slice(left);
                buf.extend_from_slice(right);
                algo.digest(&buf)
            })
            .collect();
    }

    layer.pop()
}

/// Hex encoded [`merkle_root`].
pub fn merkle_root_hex(leaves: &[Vec<u8>], algo: HashAlgorithm) -> Option<String> {
    merkle_root(leaves, algo).map(hex::encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(algo: HashAlgorithm, n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| algo.digest(format!("leaf-{}", i).as_bytes())).collect()
    }

    fn parent(algo: HashAlgorithm, left: &[u8], right: &[u8]) -> Vec<u8> {
        algo.digest(&[left, right].concat())
    }

    #[test]
    fn test_empty_has_no_root() {
        assert!(merkle_root(&[], HashAlgorithm::Sha256).is_none());
        assert!(merkle_root_hex(&[], HashAlgorithm::Sha256).is_none());
    }

    #[test]
    fn test_single_leaf_is_root() {
        for algo in HashAlgorithm::supported() {
            let l = leaves(*algo, 1);
            assert_eq!(merkle_root(&l, *algo), Some(l[0].clone()));
        }
    }

    #[test]
    fn test_two_leaves() {
        let algo = HashAlgorithm::Sha256;
        let l = leaves(algo, 2);
        assert_eq!(merkle_root(&l, algo), Some(parent(algo, &l[0], &l[1])));
    }

    #[test]
    fn test_odd_layer_duplicates_last() {
        let algo = HashAlgorithm::Blake3;
        let three = leaves(algo, 3);
        let mut four = three.clone();
        four.push(three[2].clone());

        assert_eq!(merkle_root(&three, algo), merkle_root(&four, algo));

        let expected = parent(
            algo,
            &parent(algo, &three[0], &three[1]),
            &parent(algo, &three[2], &three[2]),
        );
        assert_eq!(merkle_root(&three, algo), Some(expected));
    }

    #[test]
    fn test_order_matters() {
        let algo = HashAlgorithm::Sha256;
        let l = leaves(algo, 2);
        let reversed = vec![l[1].clone(), l[0].clone()];
        assert_ne!(merkle_root(&l, algo), merkle_root(&reversed, algo));
    }

    #[test]
    fn test_hex_width_follows_algorithm() {
        let algo = HashAlgorithm::Sha3_512;
        let root = merkle_root_hex(&leaves(algo, 5), algo).unwrap();
        assert_eq!(root.len(), 128);
    }
}
