use ethers::types::H256;
use serde::{Deserialize, Serialize};

use crate::constants::EMPTY_ROOT;

/// Layered representation of a set of pending-lock hashes. Leaves are kept
/// in insertion order; `root` is recomputed from scratch on every mutation
/// rather than patched incrementally, matching §4.A: width is small enough
/// (bounded by `MAXIMUM_PENDING_TRANSFERS`) that this is cheap, and it keeps
/// the layering unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    leaves: Vec<H256>,
}

impl MerkleTree {
    pub fn empty() -> Self {
        Self { leaves: Vec::new() }
    }

    pub fn width(&self) -> u32 {
        self.leaves.len() as u32
    }

    pub fn leaves(&self) -> &[H256] {
        &self.leaves
    }

    /// Returns a new tree with `lockhash` appended, or `None` if it is
    /// already a leaf.
    pub fn with(&self, lockhash: H256) -> Option<MerkleTree> {
        if self.leaves.contains(&lockhash) {
            return None;
        }
        let mut leaves = self.leaves.clone();
        leaves.push(lockhash);
        Some(MerkleTree { leaves })
    }

    /// Returns a new tree with `lockhash` removed, or `None` if it is not a
    /// leaf. Removing the last remaining leaf yields the empty tree.
    pub fn without(&self, lockhash: H256) -> Option<MerkleTree> {
        let position = self.leaves.iter().position(|leaf| *leaf == lockhash)?;
        let mut leaves = self.leaves.clone();
        leaves.remove(position);
        Some(MerkleTree { leaves })
    }

    /// Pairwise keccak256 hashing up the layers, sorting each pair before
    /// hashing so an already-complete pair of siblings always hashes to the
    /// same node regardless of which side observed it first. An odd
    /// trailing node is carried to the next layer unchanged, never
    /// duplicated, matching the on-chain contract's own layering.
    pub fn root(&self) -> H256 {
        if self.leaves.is_empty() {
            return EMPTY_ROOT;
        }

        let mut layer = self.leaves.clone();
        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len() / 2 + 1);
            let mut pairs = layer.chunks_exact(2);
            for pair in &mut pairs {
                next.push(hash_pair(pair[0], pair[1]));
            }
            if let [odd] = pairs.remainder() {
                next.push(*odd);
            }
            layer = next;
        }
        layer[0]
    }
}

fn hash_pair(a: H256, b: H256) -> H256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    crate::crypto::keccak256(&[lo.as_bytes(), hi.as_bytes()].concat())
}
