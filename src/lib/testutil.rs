//! Test-only helpers: a straightforward CYK recognizer that builds parse forests over a
//! [`CnfGrammar`], and a bounded brute-force derivation check over the original rules, used to
//! cross-validate the transformation.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::cfg::{CfgRule, CfgSymbol};
use crate::cnf::{CnfGrammar, RuleKey};
use crate::forest::ParseForests;
use crate::FIdx;

type Derivation<T> = (RuleKey<T>, RuleKey<T>, usize);
type CykTable<T> = HashMap<(usize, usize), HashMap<RuleKey<T>, Vec<Derivation<T>>>>;

/// Parse `input` with CYK over a CNF grammar, returning the parse forests rooted at the start
/// keys, or `None` if no start rule derives the whole input.
pub(crate) fn cyk_parse<T>(
    grm: &CnfGrammar<T>,
    input: &[T],
) -> Option<ParseForests<RuleKey<T>, u32>>
where
    T: Clone + Eq + Hash,
{
    let n = input.len();
    if n == 0 {
        return None;
    }
    let mut table: CykTable<T> = HashMap::new();
    for (i, tok) in input.iter().enumerate() {
        let cell = table.entry((i, 1)).or_default();
        for rule in grm.terminal_rules() {
            if &rule.output == tok {
                cell.entry(rule.key.clone()).or_default();
            }
        }
    }
    for len in 2..=n {
        for i in 0..=n - len {
            let mut cell: HashMap<RuleKey<T>, Vec<Derivation<T>>> = HashMap::new();
            for split in 1..len {
                let (Some(lcell), Some(rcell)) =
                    (table.get(&(i, split)), table.get(&(i + split, len - split)))
                else {
                    continue;
                };
                for rule in grm.nonterminal_rules() {
                    if lcell.contains_key(&rule.left) && rcell.contains_key(&rule.right) {
                        cell.entry(rule.key.clone()).or_default().push((
                            rule.left.clone(),
                            rule.right.clone(),
                            split,
                        ));
                    }
                }
            }
            if !cell.is_empty() {
                table.insert((i, len), cell);
            }
        }
    }

    let root_keys: Vec<RuleKey<T>> = table
        .get(&(0, n))?
        .keys()
        .filter(|k| matches!(k, RuleKey::Original(v) if grm.start_keys().contains(v)))
        .cloned()
        .collect();
    if root_keys.is_empty() {
        return None;
    }
    let mut builder = ForestBuilder {
        table: &table,
        arena: ParseForests::new(),
        memo: HashMap::new(),
    };
    for key in &root_keys {
        let root = builder.build(0, n, key);
        builder.arena.add_root(root);
    }
    Some(builder.arena)
}

pub(crate) fn cyk_accepts<T>(grm: &CnfGrammar<T>, input: &[T]) -> bool
where
    T: Clone + Eq + Hash,
{
    cyk_parse(grm, input).is_some()
}

struct ForestBuilder<'a, T> {
    table: &'a CykTable<T>,
    arena: ParseForests<RuleKey<T>, u32>,
    memo: HashMap<(usize, usize, RuleKey<T>), FIdx<u32>>,
}

impl<T: Clone + Eq + Hash> ForestBuilder<'_, T> {
    fn build(&mut self, i: usize, len: usize, key: &RuleKey<T>) -> FIdx<u32> {
        let memo_key = (i, len, key.clone());
        if let Some(&fidx) = self.memo.get(&memo_key) {
            return fidx;
        }
        // Terminal matches have no recorded derivations and so become leaves.
        let derivations = self.table[&(i, len)][key].clone();
        let mut possibilities = Vec::with_capacity(derivations.len());
        for (left, right, split) in &derivations {
            let lf = self.build(i, *split, left);
            let rf = self.build(i + split, len - split, right);
            possibilities.push(self.arena.add_tree(vec![lf, rf]));
        }
        let fidx = self.arena.add_forest(key.clone(), possibilities);
        self.memo.insert(memo_key, fidx);
        fidx
    }
}

/// Can `start` derive exactly `input` under the original rules? Brute-force leftmost expansion,
/// pruned on sentential-form length and matched terminal prefix. Assumes no production is empty,
/// so every symbol derives at least one token.
pub(crate) fn derivable<T>(cfg: &[CfgRule<T>], start: T, input: &[T]) -> bool
where
    T: Clone + Eq + Hash,
{
    let mut prods: HashMap<&T, Vec<&Vec<CfgSymbol<T>>>> = HashMap::new();
    for rule in cfg {
        prods.entry(&rule.name).or_default().extend(rule.prods.iter());
    }
    let init = vec![CfgSymbol::Nonterm(start)];
    let mut seen: HashSet<Vec<CfgSymbol<T>>> = HashSet::new();
    let mut pending = vec![init.clone()];
    seen.insert(init);
    while let Some(form) = pending.pop() {
        let mut leftmost = None;
        let mut prefix_matches = true;
        for (i, sym) in form.iter().enumerate() {
            match sym {
                CfgSymbol::Term(t) => {
                    if input.get(i) != Some(t) {
                        prefix_matches = false;
                        break;
                    }
                }
                CfgSymbol::Nonterm(_) => {
                    leftmost = Some(i);
                    break;
                }
            }
        }
        if !prefix_matches {
            continue;
        }
        match leftmost {
            None => {
                if form.len() == input.len() {
                    return true;
                }
            }
            Some(i) => {
                let CfgSymbol::Nonterm(name) = &form[i] else {
                    unreachable!()
                };
                if let Some(alternatives) = prods.get(name) {
                    for prod in alternatives {
                        let mut next: Vec<CfgSymbol<T>> =
                            Vec::with_capacity(form.len() - 1 + prod.len());
                        next.extend_from_slice(&form[..i]);
                        next.extend(prod.iter().cloned());
                        next.extend_from_slice(&form[i + 1..]);
                        if next.len() <= input.len() && seen.insert(next.clone()) {
                            pending.push(next);
                        }
                    }
                }
            }
        }
    }
    false
}
