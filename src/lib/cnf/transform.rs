//! The CNF transformation passes. Each pass is a pure function from one rule collection to a
//! brand-new one: no mutable state crosses a pass boundary, and every synthesized rule id is
//! allocated through the pass's own [`RuleBuilder`].

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use indexmap::IndexSet;
use num_traits::{self, AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use super::building::{BuildingRule, BuildingSymbol, RuleBuilder};
use super::grammar::CnfGrammarError;
use crate::{VIdx, cfg::CfgRule, cfg::CfgSymbol};

type FnvMap<K, V> = HashMap<K, V, BuildHasherDefault<FnvHasher>>;

/// Map every distinct grammar value (rule name or terminal output) to a dense [`VIdx`] and build
/// the initial rule collection over those indices. The returned `IndexSet` is the bijection: a
/// value's dense id is its position in the set.
pub(crate) fn build_initial_rules<T, StorageT>(
    cfg_rules: &[CfgRule<T>],
) -> Result<(Vec<BuildingRule<StorageT>>, IndexSet<T>), CnfGrammarError>
where
    T: Clone + Eq + Hash,
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let mut values = IndexSet::new();
    for rule in cfg_rules {
        values.insert(rule.name.clone());
    }
    for rule in cfg_rules {
        for prod in &rule.prods {
            for sym in prod {
                if let CfgSymbol::Term(t) = sym {
                    values.insert(t.clone());
                }
            }
        }
    }
    // Check that StorageT is big enough to hold the dense ids we're about to assign.
    if values.len() > num_traits::cast(StorageT::max_value()).unwrap() {
        panic!("StorageT is not big enough to store this grammar's values.");
    }

    let mut building = Vec::new();
    for rule in cfg_rules {
        let lhs = VIdx(values.get_index_of(&rule.name).unwrap().as_());
        for prod in &rule.prods {
            if prod.is_empty() {
                // Chomsky reduced form has no ε-productions.
                return Err(CnfGrammarError::EmptyProduction);
            }
            let mut rhs = Vec::with_capacity(prod.len());
            for sym in prod {
                rhs.push(match sym {
                    CfgSymbol::Term(t) => {
                        BuildingSymbol::Term(VIdx(values.get_index_of(t).unwrap().as_()))
                    }
                    CfgSymbol::Nonterm(n) => match values.get_index_of(n) {
                        Some(i) => BuildingSymbol::Nonterm(VIdx(i.as_())),
                        None => return Err(CnfGrammarError::UnknownRuleRef),
                    },
                });
            }
            building.push(BuildingRule {
                lhs,
                rhs,
                temporary: false,
            });
        }
    }
    Ok((building, values))
}

/// TERM: replace every terminal occurring in a right-hand side of length > 1 with a reference to
/// a synthesized `T_new → terminal` rule, one per distinct terminal value across the whole pass.
/// After this pass every multi-symbol right-hand side consists solely of nonterminals.
pub(crate) fn run_term<StorageT>(rules: Vec<BuildingRule<StorageT>>) -> Vec<BuildingRule<StorageT>>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let mut builder = RuleBuilder::with_reserved_from(&rules);
    let mut term_refs: FnvMap<VIdx<StorageT>, BuildingSymbol<StorageT>> = FnvMap::default();
    for rule in rules {
        if rule.rhs.len() > 1 && rule.rhs.iter().any(|s| s.is_term()) {
            let mut new_rhs = Vec::with_capacity(rule.rhs.len());
            for &sym in &rule.rhs {
                if sym.is_term() {
                    new_rhs.push(
                        *term_refs
                            .entry(sym.vidx())
                            .or_insert_with(|| builder.fresh_temp_rule(vec![sym])),
                    );
                } else {
                    new_rhs.push(sym);
                }
            }
            builder.add_rule_with_rhs(&rule, new_rhs);
        } else {
            builder.add_rule(rule);
        }
    }
    builder.into_rules()
}

/// BIN: for every right-hand side with more than 2 nonterminals, repeatedly peel the trailing two
/// nonterminals off into a fresh binary temporary rule, leaving a right-leaning chain. Sides with
/// at most 2 nonterminals pass through unchanged.
pub(crate) fn run_bin<StorageT>(rules: Vec<BuildingRule<StorageT>>) -> Vec<BuildingRule<StorageT>>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let mut builder = RuleBuilder::with_reserved_from(&rules);
    for rule in rules {
        let mut nonterms = rule.rhs.iter().filter(|s| !s.is_term()).count();
        if nonterms > 2 {
            let mut new_rhs = rule.rhs.clone();
            while nonterms > 2 {
                let mut peeled = Vec::new();
                let mut moved = 0;
                while moved < 2 {
                    let sym = new_rhs.pop().unwrap();
                    if !sym.is_term() {
                        moved += 1;
                    }
                    peeled.push(sym);
                }
                peeled.reverse();
                new_rhs.push(builder.fresh_temp_rule(peeled));
                // We removed two nonterminals, but added a reference to the new rule back.
                nonterms -= 1;
            }
            builder.add_rule_with_rhs(&rule, new_rhs);
        } else {
            builder.add_rule(rule);
        }
    }
    builder.into_rules()
}

fn max_id<StorageT>(rules: &[BuildingRule<StorageT>]) -> usize
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
{
    rules
        .iter()
        .map(|r| {
            r.rhs
                .iter()
                .map(|s| usize::from(s.vidx()))
                .fold(usize::from(r.lhs), usize::max)
        })
        .max()
        .unwrap_or(0)
}

/// UNIT: eliminate unit productions `A → B`. Runs sweeps to a fixpoint; within one sweep a left
/// id takes part in at most one elimination (the claimed set), so rewrites always read the
/// sweep's frozen snapshot rather than intermediate state. A degenerate self-loop `A → A` adds
/// nothing to the language and is dropped outright (copying it would never converge).
pub(crate) fn run_unit<StorageT>(
    mut rules: Vec<BuildingRule<StorageT>>,
) -> Vec<BuildingRule<StorageT>>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    loop {
        let mut changed = false;
        let mut claimed = Vob::from_elem(false, max_id(&rules) + 1);
        let mut builder = RuleBuilder::with_reserved_from(&rules);
        for rule in &rules {
            let mut carry = true;
            if !claimed[usize::from(rule.lhs)] && rule.rhs.len() == 1 {
                if let BuildingSymbol::Nonterm(target) = rule.rhs[0] {
                    if target == rule.lhs {
                        carry = false;
                        changed = true;
                    } else if !claimed[usize::from(target)] {
                        carry = false;
                        changed = true;
                        claimed.set(usize::from(rule.lhs), true);
                        claimed.set(usize::from(target), true);
                        for inner in &rules {
                            if inner.lhs == target {
                                builder.add_rule(BuildingRule {
                                    lhs: rule.lhs,
                                    rhs: inner.rhs.clone(),
                                    temporary: rule.temporary,
                                });
                            }
                        }
                    }
                }
            }
            if carry {
                builder.add_rule(rule.clone());
            }
        }
        rules = builder.into_rules();
        if !changed {
            return rules;
        }
    }
}

/// Merge semantically redundant temporaries: candidates are temporary rules whose left id owns
/// exactly one rule and whose right-hand side doesn't reference that id. Whenever two candidates
/// have identical right-hand sides, the first-seen one is kept, every reference to the other is
/// rewritten to the keeper, and the duplicate's rule is dropped. Repeats until no merge is found.
/// An optimization for forest size, not required for CNF correctness.
pub(crate) fn run_dedup_temporaries<StorageT>(
    mut rules: Vec<BuildingRule<StorageT>>,
) -> Vec<BuildingRule<StorageT>>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let mut counts: FnvMap<VIdx<StorageT>, usize> = FnvMap::default();
    for rule in &rules {
        *counts.entry(rule.lhs).or_insert(0) += 1;
    }
    // Candidate ids are captured once; their (single) rule's right-hand side is re-read from the
    // current rule collection on every scan, since rewrites may have changed it.
    let mut candidates: Vec<VIdx<StorageT>> = rules
        .iter()
        .filter(|r| {
            counts[&r.lhs] == 1
                && r.temporary
                && !r.rhs.iter().any(|s| !s.is_term() && s.vidx() == r.lhs)
        })
        .map(|r| r.lhs)
        .collect();

    loop {
        let found = {
            let by_lhs: FnvMap<VIdx<StorageT>, &[BuildingSymbol<StorageT>]> =
                rules.iter().map(|r| (r.lhs, r.rhs.as_slice())).collect();
            let mut seen: HashMap<&[BuildingSymbol<StorageT>], VIdx<StorageT>> = HashMap::new();
            let mut found = None;
            for (i, &lhs) in candidates.iter().enumerate() {
                let rhs = by_lhs[&lhs];
                if let Some(&keeper) = seen.get(rhs) {
                    found = Some((keeper, lhs, i));
                    break;
                }
                seen.insert(rhs, lhs);
            }
            found
        };
        match found {
            None => return rules,
            Some((keeper, duplicate, at)) => {
                candidates.remove(at);
                let replacement = BuildingSymbol::Nonterm(keeper);
                rules = rules
                    .into_iter()
                    .filter(|r| r.lhs != duplicate)
                    .map(|mut r| {
                        for sym in r.rhs.iter_mut() {
                            if !sym.is_term() && sym.vidx() == duplicate {
                                *sym = replacement;
                            }
                        }
                        r
                    })
                    .collect();
            }
        }
    }
}

/// Discard every rule whose left id is unreachable from the starting ids, following nonterminal
/// right-hand-side references.
pub(crate) fn run_prune_unreachable<StorageT>(
    rules: Vec<BuildingRule<StorageT>>,
    start_ids: &[VIdx<StorageT>],
) -> Vec<BuildingRule<StorageT>>
where
    StorageT: 'static + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    let len = start_ids
        .iter()
        .map(|&v| usize::from(v))
        .fold(max_id(&rules), usize::max)
        + 1;
    let mut visited = Vob::from_elem(false, len);
    let mut by_lhs: FnvMap<VIdx<StorageT>, Vec<&BuildingRule<StorageT>>> = FnvMap::default();
    for rule in &rules {
        by_lhs.entry(rule.lhs).or_default().push(rule);
    }
    let mut pending: Vec<VIdx<StorageT>> = start_ids.to_vec();
    while let Some(id) = pending.pop() {
        if visited[usize::from(id)] {
            continue;
        }
        visited.set(usize::from(id), true);
        if let Some(owned) = by_lhs.get(&id) {
            for rule in owned {
                for sym in &rule.rhs {
                    if !sym.is_term() {
                        pending.push(sym.vidx());
                    }
                }
            }
        }
    }
    drop(by_lhs);
    rules
        .into_iter()
        .filter(|r| visited[usize::from(r.lhs)])
        .collect()
}
