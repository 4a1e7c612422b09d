//! Size statistics over parse forests: node counts, depths, and the number of distinct parse
//! trees a forest set represents.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use num_traits::{PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ParseForests;
use crate::FIdx;

type FnvMap<K, V> = HashMap<K, V, BuildHasherDefault<FnvHasher>>;

/// Aggregate statistics for a set of parse forests.
///
/// Node counts exclude leaves. `ways` is the number of distinct parse trees represented;
/// `None` means the count overflowed a `u64`, and once overflowed it stays overflowed through
/// every further combination.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseForestStats {
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub min_depth: usize,
    pub max_depth: usize,
    pub ways: Option<u64>,
}

fn mul_ways(left: Option<u64>, right: Option<u64>) -> Option<u64> {
    match (left, right) {
        (Some(l), Some(r)) => l.checked_mul(r),
        _ => None,
    }
}

impl ParseForestStats {
    fn leaf(depth: usize) -> Self {
        ParseForestStats {
            min_nodes: 0,
            max_nodes: 0,
            min_depth: depth,
            max_depth: depth,
            ways: Some(1),
        }
    }

    /// Fold in a sibling within one derivation: node counts add, the tree is as deep as its
    /// deepest child, and the choices among children multiply.
    fn combine_tree(self, other: Self) -> Self {
        let max_depth = self.max_depth.max(other.max_depth);
        ParseForestStats {
            min_nodes: self.min_nodes + other.min_nodes,
            max_nodes: self.max_nodes + other.max_nodes,
            min_depth: max_depth,
            max_depth,
            ways: mul_ways(self.ways, other.ways),
        }
    }

    /// Fold in an alternative derivation of the same forest.
    fn combine_forest(self, other: Self) -> Self {
        ParseForestStats {
            min_nodes: self.min_nodes.min(other.min_nodes),
            max_nodes: self.max_nodes.max(other.max_nodes),
            min_depth: self.min_depth.min(other.min_depth),
            max_depth: self.max_depth.max(other.max_depth),
            ways: mul_ways(self.ways, other.ways),
        }
    }

    fn counted(self) -> Self {
        ParseForestStats {
            min_nodes: self.min_nodes + 1,
            max_nodes: self.max_nodes + 1,
            ..self
        }
    }

    fn scaled(self, possibilities: usize) -> Self {
        ParseForestStats {
            ways: mul_ways(self.ways, Some(possibilities as u64)),
            ..self
        }
    }
}

impl<K, StorageT: PrimInt + Unsigned + Hash> ParseForests<K, StorageT> {
    /// Compute aggregate statistics across all roots, or `None` if there are no roots.
    ///
    /// Statistics are memoized per node, so shared subtrees are costed once; a node shared at
    /// several depths reports the depth at which it was first reached.
    ///
    /// # Panics
    ///
    /// If the arena contains a tree with no children, which [`ParseForests`] never builds from a
    /// recognizer's output.
    pub fn stats(&self) -> Option<ParseForestStats> {
        let mut memo: FnvMap<usize, ParseForestStats> = FnvMap::default();
        let mut acc: Option<ParseForestStats> = None;
        for &root in self.roots() {
            let root_stats = self.forest_stats(&mut memo, 0, root);
            acc = Some(match acc {
                None => root_stats,
                Some(a) => a.combine_forest(root_stats),
            });
        }
        acc
    }

    fn forest_stats(
        &self,
        memo: &mut FnvMap<usize, ParseForestStats>,
        depth: usize,
        fidx: FIdx<StorageT>,
    ) -> ParseForestStats {
        if let Some(&stats) = memo.get(&usize::from(fidx)) {
            return stats;
        }
        let possibilities = self.possibilities(fidx);
        let stats = if possibilities.is_empty() {
            ParseForestStats::leaf(depth)
        } else {
            let mut acc: Option<ParseForestStats> = None;
            for &tridx in possibilities {
                let mut tree_acc: Option<ParseForestStats> = None;
                for &child in self.children(tridx) {
                    let child_stats = self.forest_stats(memo, depth + 1, child);
                    tree_acc = Some(match tree_acc {
                        None => child_stats,
                        Some(a) => a.combine_tree(child_stats),
                    });
                }
                match tree_acc {
                    None => panic!("Parse tree without children."),
                    Some(tree_stats) => {
                        let tree_stats = tree_stats.counted();
                        acc = Some(match acc {
                            None => tree_stats,
                            Some(a) => a.combine_forest(tree_stats),
                        });
                    }
                }
            }
            acc.unwrap().scaled(possibilities.len())
        };
        memo.insert(usize::from(fidx), stats);
        stats
    }
}
