//! Parse forests addressed by arena indices, plus the operations over them: flattening away
//! temporary rules ([`flatten`]) and size statistics ([`stats`]).
//!
//! A forest node pairs a rule key with the alternative derivations ("possibilities") of that
//! rule over one input span; each possibility is a tree node listing the child forests of one
//! derivation. Sharing is by index: two parents referencing the same [`FIdx`] share that subtree,
//! which is what keeps ambiguous parses compact and what the statistics code keys its
//! memoization on.

use std::hash::Hash;

use num_traits::{self, AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{FIdx, TrIdx};

pub mod flatten;
pub mod stats;

pub use flatten::{FlattenError, FlattenErrorKind, flatten_temporaries};
pub use stats::ParseForestStats;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ForestNode<K, StorageT> {
    rule: K,
    possibilities: Vec<TrIdx<StorageT>>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct TreeNode<StorageT> {
    children: Vec<FIdx<StorageT>>,
}

/// An arena of parse forests over rule keys of type `K`, with zero or more root forests.
///
/// Nodes are created bottom-up: children must exist before the tree that references them, and
/// trees before the forest that lists them as possibilities, so cycles are unrepresentable.
/// Leaves are forest nodes with no possibilities.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseForests<K, StorageT = u32> {
    forests: Vec<ForestNode<K, StorageT>>,
    trees: Vec<TreeNode<StorageT>>,
    roots: Vec<FIdx<StorageT>>,
}

impl<K, StorageT> ParseForests<K, StorageT>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    pub fn new() -> Self {
        ParseForests {
            forests: Vec::new(),
            trees: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Add a tree with the given child forests, returning its index.
    pub fn add_tree(&mut self, children: Vec<FIdx<StorageT>>) -> TrIdx<StorageT> {
        // Check that StorageT is big enough for the new index.
        if self.trees.len() >= num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to index this many trees.");
        }
        let idx = TrIdx(self.trees.len().as_());
        self.trees.push(TreeNode { children });
        idx
    }

    /// Add a forest for `rule` with the given possibilities, returning its index. A forest with
    /// no possibilities is a leaf.
    pub fn add_forest(&mut self, rule: K, possibilities: Vec<TrIdx<StorageT>>) -> FIdx<StorageT> {
        if self.forests.len() >= num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to index this many forests.");
        }
        let idx = FIdx(self.forests.len().as_());
        self.forests.push(ForestNode {
            rule,
            possibilities,
        });
        idx
    }

    /// Mark an existing forest as a root.
    pub fn add_root(&mut self, fidx: FIdx<StorageT>) {
        self.roots.push(fidx);
    }
}

impl<K, StorageT: PrimInt + Unsigned> ParseForests<K, StorageT> {
    pub fn roots(&self) -> &[FIdx<StorageT>] {
        &self.roots
    }

    pub fn rule(&self, fidx: FIdx<StorageT>) -> &K {
        &self.forests[usize::from(fidx)].rule
    }

    pub fn possibilities(&self, fidx: FIdx<StorageT>) -> &[TrIdx<StorageT>] {
        &self.forests[usize::from(fidx)].possibilities
    }

    pub fn children(&self, tridx: TrIdx<StorageT>) -> &[FIdx<StorageT>] {
        &self.trees[usize::from(tridx)].children
    }

    /// A leaf derives its rule's terminal output directly: it has no possibilities.
    pub fn is_leaf(&self, fidx: FIdx<StorageT>) -> bool {
        self.possibilities(fidx).is_empty()
    }

    pub fn forests_len(&self) -> usize {
        self.forests.len()
    }
}

impl<K, StorageT> Default for ParseForests<K, StorageT>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    fn default() -> Self {
        Self::new()
    }
}
