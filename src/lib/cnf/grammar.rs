use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::hash_map::Entry;
use std::error::Error;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::building::{BuildingRule, BuildingSymbol};
use super::transform;
use crate::{VIdx, cfg::CfgRule};

/// The key under which one CNF rule is addressed, both in a [`CnfGrammar`] and in the parse
/// forests an external recognizer builds over it.
///
/// Temporary and original keys live in disjoint spaces by construction: a `Temporary` key never
/// equals an `Original` key, even if the temporary's id happens to coincide with some value's
/// dense id.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RuleKey<T, StorageT = u32> {
    /// A nonterminal synthesized during the transformation, invisible in the original grammar.
    Temporary(VIdx<StorageT>),
    /// A nonterminal of the original grammar, carrying the caller's own value.
    Original(T),
}

impl<T, StorageT> RuleKey<T, StorageT> {
    pub fn is_temporary(&self) -> bool {
        matches!(self, RuleKey::Temporary(_))
    }
}

/// A CNF rule `key → output` producing a single terminal.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TerminalRule<T, StorageT = u32> {
    pub key: RuleKey<T, StorageT>,
    pub temporary: bool,
    pub output: T,
}

/// A CNF rule `key → left right` over two nonterminal keys.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NonTerminalRule<T, StorageT = u32> {
    pub key: RuleKey<T, StorageT>,
    pub temporary: bool,
    pub left: RuleKey<T, StorageT>,
    pub right: RuleKey<T, StorageT>,
}

/// A grammar in Chomsky Normal Form (strictly, Chomsky *reduced* form: ε-productions are not
/// representable). Produced from an arbitrary context-free grammar by
/// [`CnfGrammar::from_rules`]; consumed by an external CYK-style recognizer.
///
/// `CnfGrammar` makes the following guarantees about grammars it builds itself:
///
///   * Every rule is either `A → a` (one terminal) or `A → B C` (two nonterminals).
///   * Every [`RuleKey`] referenced by a `left`/`right` field is the key of at least one rule.
///   * The rule collection is non-empty.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CnfGrammar<T, StorageT = u32>
where
    T: Eq + Hash,
{
    start_keys: HashSet<T>,
    terminal_rules: Vec<TerminalRule<T, StorageT>>,
    nonterminal_rules: Vec<NonTerminalRule<T, StorageT>>,
}

impl<T: Clone + Eq + Hash> CnfGrammar<T, u32> {
    /// Transform the context-free grammar `cfg_rules` with start rules `start_names` into
    /// Chomsky Normal Form.
    pub fn from_rules(
        cfg_rules: &[CfgRule<T>],
        start_names: HashSet<T>,
    ) -> Result<Self, CnfGrammarError> {
        CnfGrammar::from_rules_with_storaget(cfg_rules, start_names)
    }
}

impl<T, StorageT> CnfGrammar<T, StorageT>
where
    T: Clone + Eq + Hash,
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    /// As [`CnfGrammar::from_rules`], but with a user-defined `StorageT` for temporary rule ids.
    ///
    /// The pipeline is: map values to dense ids, then TERM (extract terminals out of long
    /// productions), BIN (binarize), UNIT (eliminate unit productions), duplicate-temporary
    /// merging, and unreachable-rule pruning, each pass producing a fresh rule collection.
    pub fn from_rules_with_storaget(
        cfg_rules: &[CfgRule<T>],
        start_names: HashSet<T>,
    ) -> Result<Self, CnfGrammarError> {
        let (building, values) = transform::build_initial_rules(cfg_rules)?;
        let mut start_ids = Vec::with_capacity(start_names.len());
        for name in &start_names {
            match values.get_index_of(name) {
                Some(i) => start_ids.push(VIdx(i.as_())),
                None => return Err(CnfGrammarError::InvalidStartRule),
            }
        }
        let building = transform::run_term(building);
        let building = transform::run_bin(building);
        let building = transform::run_unit(building);
        let building = transform::run_dedup_temporaries(building);
        let building = transform::run_prune_unreachable(building, &start_ids);
        if building.is_empty() {
            return Err(CnfGrammarError::EmptyGrammarAfterPruning);
        }
        Self::materialize(&building, &values, start_names)
    }

    /// Map finished building rules back into the public representation, reconciling synthesized
    /// ids and original grammar values into the single [`RuleKey`] space.
    fn materialize(
        building: &[BuildingRule<StorageT>],
        values: &IndexSet<T>,
        start_names: HashSet<T>,
    ) -> Result<Self, CnfGrammarError> {
        let mut temp_flags: HashMap<VIdx<StorageT>, bool, BuildHasherDefault<FnvHasher>> =
            HashMap::default();
        for rule in building {
            match temp_flags.entry(rule.lhs) {
                Entry::Occupied(e) => {
                    if *e.get() != rule.temporary {
                        return Err(CnfGrammarError::InconsistentRuleKey);
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(rule.temporary);
                }
            }
        }
        let key_of = |vidx: VIdx<StorageT>| -> Result<RuleKey<T, StorageT>, CnfGrammarError> {
            match temp_flags.get(&vidx) {
                None => Err(CnfGrammarError::DanglingRuleRef),
                Some(true) => Ok(RuleKey::Temporary(vidx)),
                Some(false) => values
                    .get_index(usize::from(vidx))
                    .map(|v| RuleKey::Original(v.clone()))
                    .ok_or(CnfGrammarError::DanglingRuleRef),
            }
        };

        let mut terminal_rules = Vec::new();
        let mut nonterminal_rules = Vec::new();
        for rule in building {
            let key = key_of(rule.lhs)?;
            match *rule.rhs.as_slice() {
                [BuildingSymbol::Term(t)] => terminal_rules.push(TerminalRule {
                    key,
                    temporary: rule.temporary,
                    output: values
                        .get_index(usize::from(t))
                        .cloned()
                        .ok_or(CnfGrammarError::DanglingRuleRef)?,
                }),
                [BuildingSymbol::Nonterm(l), BuildingSymbol::Nonterm(r)] => {
                    nonterminal_rules.push(NonTerminalRule {
                        key,
                        temporary: rule.temporary,
                        left: key_of(l)?,
                        right: key_of(r)?,
                    })
                }
                _ => return Err(CnfGrammarError::MalformedCnfRule),
            }
        }
        Ok(CnfGrammar {
            start_keys: start_names,
            terminal_rules,
            nonterminal_rules,
        })
    }
}

impl<T: Eq + Hash, StorageT> CnfGrammar<T, StorageT> {
    /// Assemble a `CnfGrammar` directly from its parts. `from_rules` guarantees the shape
    /// invariants above; a grammar assembled here is taken at the caller's word, and
    /// inconsistencies surface as flattening errors instead.
    pub fn new(
        start_keys: HashSet<T>,
        terminal_rules: Vec<TerminalRule<T, StorageT>>,
        nonterminal_rules: Vec<NonTerminalRule<T, StorageT>>,
    ) -> Self {
        CnfGrammar {
            start_keys,
            terminal_rules,
            nonterminal_rules,
        }
    }

    /// The values whose rules a recognizer may start from.
    pub fn start_keys(&self) -> &HashSet<T> {
        &self.start_keys
    }

    pub fn terminal_rules(&self) -> &[TerminalRule<T, StorageT>] {
        &self.terminal_rules
    }

    pub fn nonterminal_rules(&self) -> &[NonTerminalRule<T, StorageT>] {
        &self.nonterminal_rules
    }
}

#[derive(Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CnfGrammarError {
    /// The input grammar contained a zero-symbol production; Chomsky reduced form has no
    /// ε-productions.
    EmptyProduction,
    /// A production referenced a rule name that appears nowhere as a rule's left-hand side or as
    /// a terminal value.
    UnknownRuleRef,
    /// A start rule name does not appear in the grammar.
    InvalidStartRule,
    /// Unreachable-rule pruning removed every rule: the start set is disconnected from all
    /// productions.
    EmptyGrammarAfterPruning,
    /// Rules sharing a left-hand-side id disagreed on temporariness. Internal invariant; a
    /// correct pipeline never produces this.
    InconsistentRuleKey,
    /// A finished rule was neither `A → a` nor `A → B C`. Internal invariant; a correct pipeline
    /// never produces this.
    MalformedCnfRule,
    /// A rule references an id that owns no rule and maps back to no grammar value.
    DanglingRuleRef,
}

impl Error for CnfGrammarError {}

impl fmt::Display for CnfGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CnfGrammarError::EmptyProduction => {
                write!(f, "Grammar contains an empty production")
            }
            CnfGrammarError::UnknownRuleRef => {
                write!(f, "Unknown reference to a rule")
            }
            CnfGrammarError::InvalidStartRule => {
                write!(f, "Start rule does not appear in grammar")
            }
            CnfGrammarError::EmptyGrammarAfterPruning => {
                write!(f, "No rules remain after unreachable-rule pruning")
            }
            CnfGrammarError::InconsistentRuleKey => {
                write!(f, "Differing keys for what appears to be the same rule")
            }
            CnfGrammarError::MalformedCnfRule => {
                write!(f, "Building rule is not a valid CNF rule")
            }
            CnfGrammarError::DanglingRuleRef => {
                write!(f, "Rule references an id with no corresponding rule")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{CnfGrammar, CnfGrammarError, RuleKey};
    use crate::cfg::{CfgRule, CfgSymbol};
    use crate::testutil::{cyk_accepts, derivable};

    fn sym(s: &str) -> CfgSymbol<&str> {
        if s.chars().all(|c| c.is_lowercase() || !c.is_alphabetic()) {
            CfgSymbol::Term(s)
        } else {
            CfgSymbol::Nonterm(s)
        }
    }

    fn cfg_rule<'a>(name: &'a str, prods: &[&[&'a str]]) -> CfgRule<&'a str> {
        CfgRule {
            name,
            prods: prods
                .iter()
                .map(|p| p.iter().map(|s| sym(s)).collect())
                .collect(),
        }
    }

    fn starts<'a>(names: &[&'a str]) -> HashSet<&'a str> {
        names.iter().copied().collect()
    }

    /// Every key referenced by a nonterminal rule must itself be the key of some rule.
    fn assert_no_dangling_keys(grm: &CnfGrammar<&str>) {
        let keys: HashSet<_> = grm
            .terminal_rules()
            .iter()
            .map(|r| r.key.clone())
            .chain(grm.nonterminal_rules().iter().map(|r| r.key.clone()))
            .collect();
        for r in grm.nonterminal_rules() {
            assert!(keys.contains(&r.left), "dangling left key {:?}", r.left);
            assert!(keys.contains(&r.right), "dangling right key {:?}", r.right);
        }
    }

    #[test]
    fn anbn_grammar_transforms_and_recognizes() {
        // S → a S b | a b over {a, b}.
        let cfg = [cfg_rule("S", &[&["a", "S", "b"], &["a", "b"]])];
        let grm = CnfGrammar::from_rules(&cfg, starts(&["S"])).unwrap();

        // Exactly one terminal rule per terminal value, both temporary.
        assert_eq!(grm.terminal_rules().len(), 2);
        let outputs: HashSet<_> = grm.terminal_rules().iter().map(|r| r.output).collect();
        assert_eq!(outputs, starts(&["a", "b"]));
        assert!(grm.terminal_rules().iter().all(|r| r.temporary));

        // S owns two binary rules; the 3-symbol production needed one chain rule.
        let s_rules: Vec<_> = grm
            .nonterminal_rules()
            .iter()
            .filter(|r| r.key == RuleKey::Original("S"))
            .collect();
        assert_eq!(s_rules.len(), 2);
        assert_eq!(grm.nonterminal_rules().len(), 3);
        assert_no_dangling_keys(&grm);

        assert!(cyk_accepts(&grm, &["a", "b"]));
        assert!(cyk_accepts(&grm, &["a", "a", "b", "b"]));
        assert!(!cyk_accepts(&grm, &["a", "b", "a", "b"]));
        assert!(!cyk_accepts(&grm, &["a", "a", "b"]));
        assert!(!cyk_accepts(&grm, &["a"]));
    }

    #[test]
    fn unit_chain_collapses_onto_original_rule() {
        // A → B, B → C, C → x: A must end up directly owning a terminal rule for x, and no rule
        // for the unit chain survives pruning.
        let cfg = [
            cfg_rule("A", &[&["B"]]),
            cfg_rule("B", &[&["C"]]),
            cfg_rule("C", &[&["x"]]),
        ];
        let grm = CnfGrammar::from_rules(&cfg, starts(&["A"])).unwrap();
        assert!(grm.nonterminal_rules().is_empty());
        assert_eq!(grm.terminal_rules().len(), 1);
        let a = &grm.terminal_rules()[0];
        assert_eq!(a.key, RuleKey::Original("A"));
        assert_eq!(a.output, "x");
        assert!(!a.temporary);
    }

    #[test]
    fn equivalence_with_original_grammar() {
        // For every string over the alphabet up to a bounded length, CYK over the CNF grammar
        // must agree with a brute-force derivation check over the original grammar.
        let grammars: &[(&[CfgRule<&str>], &str, &[&str])] = &[
            (
                &[cfg_rule("S", &[&["a", "S", "b"], &["a", "b"]])],
                "S",
                &["a", "b"],
            ),
            (
                // Even-length palindromes plus single letters.
                &[cfg_rule(
                    "S",
                    &[&["a", "S", "a"], &["b", "S", "b"], &["a"], &["b"]],
                )],
                "S",
                &["a", "b"],
            ),
            (
                // Ambiguous expression grammar.
                &[cfg_rule("E", &[&["E", "+", "E"], &["a"]])],
                "E",
                &["a", "+"],
            ),
        ];
        for &(cfg, start, alphabet) in grammars {
            let grm = CnfGrammar::from_rules(cfg, starts(&[start])).unwrap();
            let mut inputs: Vec<Vec<&str>> = vec![Vec::new()];
            for len in 1..=5 {
                let mut next = Vec::new();
                for input in inputs.iter().filter(|i| i.len() == len - 1) {
                    for &t in alphabet {
                        let mut extended = input.clone();
                        extended.push(t);
                        next.push(extended);
                    }
                }
                inputs.extend(next);
            }
            for input in inputs.iter().filter(|i| !i.is_empty()) {
                assert_eq!(
                    cyk_accepts(&grm, input),
                    derivable(cfg, start, input),
                    "disagreement on {input:?}"
                );
            }
        }
    }

    #[test]
    fn duplicate_rule_names_merge_their_productions() {
        let cfg = [cfg_rule("S", &[&["a", "b"]]), cfg_rule("S", &[&["b", "a"]])];
        let grm = CnfGrammar::from_rules(&cfg, starts(&["S"])).unwrap();
        assert!(cyk_accepts(&grm, &["a", "b"]));
        assert!(cyk_accepts(&grm, &["b", "a"]));
        assert!(!cyk_accepts(&grm, &["a", "a"]));
    }

    #[test]
    fn invalid_start_rule_is_rejected() {
        let cfg = [cfg_rule("S", &[&["a", "b"]])];
        assert_eq!(
            CnfGrammar::from_rules(&cfg, starts(&["T"])).unwrap_err(),
            CnfGrammarError::InvalidStartRule
        );
    }

    #[test]
    fn disconnected_start_empties_the_grammar() {
        // "a" is a known value (a terminal), but no rule is reachable from it.
        let cfg = [cfg_rule("S", &[&["a", "b"]])];
        assert_eq!(
            CnfGrammar::from_rules(&cfg, starts(&["a"])).unwrap_err(),
            CnfGrammarError::EmptyGrammarAfterPruning
        );
    }

    #[test]
    fn nonterminal_sharing_a_terminal_value_dangles() {
        // The nonterminal reference resolves to the dense id of the terminal value "x", which
        // owns no rule, so materialization must report it rather than emit a dangling key.
        let cfg = [CfgRule {
            name: "S",
            prods: vec![vec![CfgSymbol::Term("x"), CfgSymbol::Nonterm("x")]],
        }];
        assert_eq!(
            CnfGrammar::from_rules(&cfg, starts(&["S"])).unwrap_err(),
            CnfGrammarError::DanglingRuleRef
        );
    }

    #[test]
    fn already_binary_grammar_needs_no_temporaries() {
        let cfg = [
            cfg_rule("S", &[&["A", "B"]]),
            cfg_rule("A", &[&["a"]]),
            cfg_rule("B", &[&["b"]]),
        ];
        let grm = CnfGrammar::from_rules(&cfg, starts(&["S"])).unwrap();
        assert!(grm.terminal_rules().iter().all(|r| !r.temporary));
        assert!(grm.nonterminal_rules().iter().all(|r| !r.temporary));
        assert_no_dangling_keys(&grm);
    }
}
