//! Undo the forest-level effects of the CNF transformation: splice away temporary rules so the
//! forests speak in terms of the original grammar's values again.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::error::Error;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use super::ParseForests;
use crate::cnf::{CnfGrammar, RuleKey};
use crate::{FIdx, TrIdx};

type FnvMap<K, V> = HashMap<K, V, BuildHasherDefault<FnvHasher>>;

/// Rewrite `forests` (keyed by the CNF grammar's [`RuleKey`]s) into forests keyed by the original
/// grammar's values, removing every trace of the transformation:
///
///   * a leaf becomes a leaf carrying the matched terminal output, shared across the whole
///     result (one output leaf per rule key);
///   * a non-temporary interior node keeps its place, keyed by its original value;
///   * a temporary interior node disappears, its derivations spliced into the parent tree's
///     child list, with one output tree per combination of spliced alternatives.
///
/// Subtree sharing in the input is preserved: a shared input node flattens to a shared output
/// node.
pub fn flatten_temporaries<T, StorageT>(
    forests: &ParseForests<RuleKey<T, StorageT>, StorageT>,
    grammar: &CnfGrammar<T, StorageT>,
) -> Result<ParseForests<T, StorageT>, FlattenError>
where
    T: Clone + Eq + Hash,
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let mut flattener = Flattener::new(forests, grammar)?;
    for &root in forests.roots() {
        match flattener.temporary.get(forests.rule(root)).copied() {
            None => return Err(FlattenErrorKind::UnknownRuleKey.into()),
            Some(true) => return Err(FlattenErrorKind::TemporaryRoot.into()),
            Some(false) => {
                let flattened = flattener.flatten_forest(root)?;
                flattener.out.add_root(flattened);
            }
        }
    }
    Ok(flattener.out)
}

struct Flattener<'a, T, StorageT> {
    src: &'a ParseForests<RuleKey<T, StorageT>, StorageT>,
    /// Rule key → temporariness, consistent across all rules sharing the key.
    temporary: FnvMap<&'a RuleKey<T, StorageT>, bool>,
    /// Rule key → the shared output leaf carrying that key's terminal output.
    terminal_leaves: FnvMap<&'a RuleKey<T, StorageT>, FIdx<StorageT>>,
    /// Non-temporary rule key → the original value it stands for.
    values: FnvMap<&'a RuleKey<T, StorageT>, &'a T>,
    out: ParseForests<T, StorageT>,
    flattened_forests: FnvMap<usize, FIdx<StorageT>>,
    flattened_trees: FnvMap<usize, Vec<TrIdx<StorageT>>>,
}

impl<'a, T, StorageT> Flattener<'a, T, StorageT>
where
    T: Clone + Eq + Hash,
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    fn new(
        src: &'a ParseForests<RuleKey<T, StorageT>, StorageT>,
        grammar: &'a CnfGrammar<T, StorageT>,
    ) -> Result<Self, FlattenError> {
        let mut temporary: FnvMap<&RuleKey<T, StorageT>, bool> = FnvMap::default();
        let rule_flags = grammar
            .nonterminal_rules()
            .iter()
            .map(|r| (&r.key, r.temporary))
            .chain(grammar.terminal_rules().iter().map(|r| (&r.key, r.temporary)));
        for (key, flag) in rule_flags {
            match temporary.entry(key) {
                Entry::Occupied(e) => {
                    if *e.get() != flag {
                        return Err(FlattenErrorKind::InconsistentTemporariness.into());
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(flag);
                }
            }
        }

        let mut out = ParseForests::new();
        let mut terminal_leaves: FnvMap<&RuleKey<T, StorageT>, FIdx<StorageT>> = FnvMap::default();
        for rule in grammar.terminal_rules() {
            match terminal_leaves.entry(&rule.key) {
                Entry::Occupied(e) => {
                    if out.rule(*e.get()) != &rule.output {
                        return Err(FlattenErrorKind::ConflictingTerminalOutputs.into());
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(out.add_forest(rule.output.clone(), Vec::new()));
                }
            }
        }

        let mut values: FnvMap<&RuleKey<T, StorageT>, &T> = FnvMap::default();
        for rule in grammar.nonterminal_rules().iter().filter(|r| !r.temporary) {
            match &rule.key {
                RuleKey::Original(v) => {
                    values.insert(&rule.key, v);
                }
                // A non-temporary rule under a synthesized key has no value to map back to.
                RuleKey::Temporary(_) => {
                    return Err(FlattenErrorKind::UnmappableValue.into());
                }
            }
        }

        Ok(Flattener {
            src,
            temporary,
            terminal_leaves,
            values,
            out,
            flattened_forests: FnvMap::default(),
            flattened_trees: FnvMap::default(),
        })
    }

    /// Flatten a non-temporary forest node to a single output node.
    fn flatten_forest(&mut self, fidx: FIdx<StorageT>) -> Result<FIdx<StorageT>, FlattenError> {
        if let Some(&done) = self.flattened_forests.get(&usize::from(fidx)) {
            return Ok(done);
        }
        let src = self.src;
        let key = src.rule(fidx);
        let flattened = if src.is_leaf(fidx) {
            *self
                .terminal_leaves
                .get(key)
                .ok_or(FlattenErrorKind::NonTerminalLeaf)?
        } else {
            let value = (*self
                .values
                .get(key)
                .ok_or(FlattenErrorKind::UnmappableValue)?)
            .clone();
            let mut trees = Vec::new();
            for &tridx in src.possibilities(fidx) {
                trees.extend(self.flatten_tree(tridx)?);
            }
            self.out.add_forest(value, trees)
        };
        self.flattened_forests.insert(usize::from(fidx), flattened);
        Ok(flattened)
    }

    /// Flatten one derivation. Splicing a temporary child multiplies out: the result is one
    /// output tree per combination of choices across the tree's children.
    fn flatten_tree(
        &mut self,
        tridx: TrIdx<StorageT>,
    ) -> Result<Vec<TrIdx<StorageT>>, FlattenError> {
        if let Some(done) = self.flattened_trees.get(&usize::from(tridx)) {
            return Ok(done.clone());
        }
        let src = self.src;
        // Per child, the alternative child-forest runs it contributes to the output tree.
        let mut segments: Vec<Vec<Vec<FIdx<StorageT>>>> = Vec::new();
        for &child in src.children(tridx) {
            let key = src.rule(child);
            if src.is_leaf(child) {
                let leaf = *self
                    .terminal_leaves
                    .get(key)
                    .ok_or(FlattenErrorKind::NonTerminalLeaf)?;
                segments.push(vec![vec![leaf]]);
            } else {
                match self.temporary.get(key).copied() {
                    None => return Err(FlattenErrorKind::UnknownRuleKey.into()),
                    Some(true) => {
                        let mut alternatives = Vec::new();
                        for &inner in src.possibilities(child) {
                            for spliced in self.flatten_tree(inner)? {
                                alternatives.push(self.out.children(spliced).to_vec());
                            }
                        }
                        segments.push(alternatives);
                    }
                    Some(false) => {
                        segments.push(vec![vec![self.flatten_forest(child)?]]);
                    }
                }
            }
        }

        let mut combinations: Vec<Vec<FIdx<StorageT>>> = vec![Vec::new()];
        for segment in &segments {
            let mut extended = Vec::with_capacity(segment.len() * combinations.len());
            for run in segment {
                for existing in &combinations {
                    let mut combined = existing.clone();
                    combined.extend_from_slice(run);
                    extended.push(combined);
                }
            }
            combinations = extended;
        }
        let flattened: Vec<TrIdx<StorageT>> = combinations
            .into_iter()
            .map(|children| self.out.add_tree(children))
            .collect();
        self.flattened_trees
            .insert(usize::from(tridx), flattened.clone());
        Ok(flattened)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct FlattenError {
    kind: FlattenErrorKind,
}

impl FlattenError {
    pub fn kind(&self) -> &FlattenErrorKind {
        &self.kind
    }
}

impl From<FlattenErrorKind> for FlattenError {
    fn from(kind: FlattenErrorKind) -> Self {
        FlattenError { kind }
    }
}

#[derive(Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum FlattenErrorKind {
    /// A root forest's rule is temporary: there is nothing to attach its derivations to.
    TemporaryRoot,
    /// Rules sharing a key disagree on temporariness.
    InconsistentTemporariness,
    /// Terminal rules sharing a key produce differing outputs, so a leaf under that key has no
    /// single value.
    ConflictingTerminalOutputs,
    /// A forest's rule key owns no rule in the grammar.
    UnknownRuleKey,
    /// A leaf forest's rule key owns no terminal rule.
    NonTerminalLeaf,
    /// A non-temporary rule's key is not an original grammar value.
    UnmappableValue,
}

impl Error for FlattenError {}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            FlattenErrorKind::TemporaryRoot => {
                write!(f, "One or more root rules is temporary")
            }
            FlattenErrorKind::InconsistentTemporariness => {
                write!(f, "Rule key has both temporary and non-temporary rules")
            }
            FlattenErrorKind::ConflictingTerminalOutputs => {
                write!(f, "Rule key has terminal rules with differing outputs")
            }
            FlattenErrorKind::UnknownRuleKey => {
                write!(f, "Forest references a rule key with no rules")
            }
            FlattenErrorKind::NonTerminalLeaf => {
                write!(f, "Leaf forest's rule key has no terminal rule")
            }
            FlattenErrorKind::UnmappableValue => {
                write!(f, "Rule key cannot be converted back into a value")
            }
        }
    }
}
