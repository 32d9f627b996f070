//! Lean Incremental Merkle Tree
//!
//! Append-only accumulator for commitment leaves. Unlike a sparse tree there
//! are no empty subtrees: a node without a right sibling is carried up to the
//! next level unchanged instead of being hashed against zero.
//!
//! ```text
//!              Root = H(H01, L2)
//!               /          \
//!            H01            L2      <- carried, not H(L2, 0)
//!           /   \           |
//!          L0   L1          L2
//! ```
//!
//! The tree keeps only `{size, depth, side_nodes}`. Proofs are rebuilt from
//! the full leaf list so that a proof for any historical index can be
//! reproduced at any later time.

use ark_ff::AdditiveGroup;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{PrivacyError, Result};
use crate::field::{FieldElement, serde_field_vec};
use crate::poseidon2::hash2;

/// Maximum tree depth (supports 2^32 leaves)
pub const MAX_DEPTH: usize = 32;

/// Maximum number of leaves
pub const MAX_LEAVES: u64 = 1 << MAX_DEPTH;

/// Incremental tree state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeanImt {
    size: u64,
    depth: usize,
    /// `side_nodes[l]` is the latest unpaired left node at level `l`;
    /// `side_nodes[depth]` is the root. One extra slot for depth 32.
    side_nodes: [FieldElement; MAX_DEPTH + 1],
}

impl LeanImt {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            size: 0,
            depth: 0,
            side_nodes: [FieldElement::ZERO; MAX_DEPTH + 1],
        }
    }

    /// Rebuild a tree by inserting `leaves` in order
    pub fn from_leaves(leaves: &[FieldElement]) -> Result<Self> {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    /// Rebuild from leaves and check the result against persisted state
    pub fn restore(
        leaves: &[FieldElement],
        depth: usize,
        side_nodes: &[FieldElement],
    ) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(PrivacyError::DepthTooLarge {
                depth,
                max: MAX_DEPTH,
            });
        }
        let tree = Self::from_leaves(leaves)?;
        if tree.depth != depth {
            return Err(PrivacyError::TreeStateMismatch { level: depth });
        }
        for (level, expected) in tree.side_nodes.iter().enumerate() {
            let persisted = side_nodes.get(level).copied().unwrap_or(FieldElement::ZERO);
            if persisted != *expected {
                return Err(PrivacyError::TreeStateMismatch { level });
            }
        }
        Ok(tree)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn side_nodes(&self) -> &[FieldElement; MAX_DEPTH + 1] {
        &self.side_nodes
    }

    /// Current root, `None` for the empty tree
    pub fn root(&self) -> Option<FieldElement> {
        if self.size == 0 {
            None
        } else {
            Some(self.side_nodes[self.depth])
        }
    }

    /// Append a leaf and return the new root
    ///
    /// A right child (bit set) is hashed with the waiting side node; a left
    /// child replaces the side node and travels up as-is.
    pub fn insert(&mut self, leaf: FieldElement) -> Result<FieldElement> {
        let index = self.size;
        if index >= MAX_LEAVES {
            return Err(PrivacyError::TreeFull(index));
        }

        if (1u64 << self.depth) < index + 1 {
            self.depth += 1;
        }

        let mut node = leaf;
        for level in 0..self.depth {
            if (index >> level) & 1 == 1 {
                node = hash2(self.side_nodes[level], node);
            } else {
                self.side_nodes[level] = node;
            }
        }

        self.side_nodes[self.depth] = node;
        self.size += 1;
        Ok(node)
    }
}

impl Default for LeanImt {
    fn default() -> Self {
        Self::new()
    }
}

/// Inclusion proof: one sibling per level, leaf to root, zero past the depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleProof {
    pub siblings: [FieldElement; MAX_DEPTH],
}

impl MerkleProof {
    pub fn new(siblings: [FieldElement; MAX_DEPTH]) -> Self {
        Self { siblings }
    }

    /// Build a proof from a (possibly short) sibling list, zero-padding to 32
    pub fn from_slice(siblings: &[FieldElement]) -> Result<Self> {
        if siblings.len() > MAX_DEPTH {
            return Err(PrivacyError::DepthTooLarge {
                depth: siblings.len(),
                max: MAX_DEPTH,
            });
        }
        let mut padded = [FieldElement::ZERO; MAX_DEPTH];
        padded[..siblings.len()].copy_from_slice(siblings);
        Ok(Self { siblings: padded })
    }

    /// Replay the insertion rule from `leaf` up to level `depth`
    ///
    /// A left child with a zero sibling had no right neighbour and is carried.
    pub fn compute_root(&self, leaf: FieldElement, index: u64, depth: usize) -> FieldElement {
        let mut node = leaf;
        for (level, sibling) in self.siblings.iter().enumerate().take(depth.min(MAX_DEPTH)) {
            if (index >> level) & 1 == 1 {
                node = hash2(*sibling, node);
            } else if *sibling != FieldElement::ZERO {
                node = hash2(node, *sibling);
            }
        }
        node
    }
}

impl Default for MerkleProof {
    fn default() -> Self {
        Self {
            siblings: [FieldElement::ZERO; MAX_DEPTH],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ProofRepr(#[serde(with = "serde_field_vec")] Vec<FieldElement>);

impl Serialize for MerkleProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ProofRepr(self.siblings.to_vec()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MerkleProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let ProofRepr(siblings) = ProofRepr::deserialize(deserializer)?;
        Self::from_slice(&siblings).map_err(serde::de::Error::custom)
    }
}

/// Every level of the tree, rebuilt bottom-up from the leaf list
///
/// Building once and reading many proofs avoids rehashing the whole tree
/// per index.
#[derive(Debug, Clone)]
pub struct TreeLevels {
    levels: Vec<Vec<FieldElement>>,
}

impl TreeLevels {
    /// Hash the first `size` leaves into levels up to a single root
    pub fn build(leaves: &[FieldElement], size: u64) -> Result<Self> {
        let size = usize::try_from(size).map_err(|_| PrivacyError::TreeFull(size))?;
        if size > leaves.len() {
            return Err(PrivacyError::MissingLeaves {
                size: size as u64,
                available: leaves.len(),
            });
        }

        let mut levels = vec![leaves[..size].to_vec()];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let next: Vec<FieldElement> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash2(*left, *right),
                    [lone] => *lone,
                    _ => unreachable!("chunks(2) yields one or two elements"),
                })
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    pub fn size(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Number of hashing levels above the leaves
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn root(&self) -> Option<FieldElement> {
        self.levels.last().and_then(|top| top.first().copied())
    }

    /// Siblings for `leaf_index` over the first `depth` levels
    pub fn proof(&self, leaf_index: u64, depth: usize) -> Result<MerkleProof> {
        if depth > MAX_DEPTH {
            return Err(PrivacyError::DepthTooLarge {
                depth,
                max: MAX_DEPTH,
            });
        }
        if leaf_index >= self.size() {
            return Err(PrivacyError::LeafIndexOutOfRange {
                index: leaf_index,
                size: self.size(),
            });
        }

        let mut siblings = [FieldElement::ZERO; MAX_DEPTH];
        let mut position = leaf_index as usize;
        for (level, slot) in siblings.iter_mut().enumerate().take(depth) {
            let Some(nodes) = self.levels.get(level) else {
                break;
            };
            let sibling = if position % 2 == 1 {
                nodes.get(position - 1)
            } else {
                nodes.get(position + 1)
            };
            *slot = sibling.copied().unwrap_or(FieldElement::ZERO);
            position /= 2;
        }
        Ok(MerkleProof { siblings })
    }
}

/// Inclusion proof for `leaf_index` rebuilt from the first `size` leaves
pub fn prove_inclusion(
    leaf_index: u64,
    depth: usize,
    leaves: &[FieldElement],
    size: u64,
) -> Result<MerkleProof> {
    if depth > MAX_DEPTH {
        return Err(PrivacyError::DepthTooLarge {
            depth,
            max: MAX_DEPTH,
        });
    }
    TreeLevels::build(leaves, size)?.proof(leaf_index, depth)
}

/// True when `proof` links `leaf` at `index` to `root`
pub fn verify_inclusion(
    leaf: FieldElement,
    index: u64,
    depth: usize,
    root: FieldElement,
    proof: &MerkleProof,
) -> bool {
    depth <= MAX_DEPTH && proof.compute_root(leaf, index, depth) == root
}

/// Root history for the tree
///
/// Stores recent roots to allow transitions to reference
/// slightly stale roots.
#[derive(Debug, Clone)]
pub struct RootHistory {
    /// Recent roots (most recent first)
    roots: Vec<FieldElement>,
    max_size: usize,
}

impl RootHistory {
    /// Keep up to `max_size` roots; the current root is always kept
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            roots: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, root: FieldElement) {
        self.roots.insert(0, root);
        self.roots.truncate(self.max_size);
    }

    /// Current or recent root
    pub fn is_valid(&self, root: &FieldElement) -> bool {
        self.roots.contains(root)
    }

    pub fn current(&self) -> Option<&FieldElement> {
        self.roots.first()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}
