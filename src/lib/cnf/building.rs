use std::collections::HashSet;
use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use num_traits::{self, AsPrimitive, PrimInt, Unsigned};

use crate::VIdx;

/// A single symbol on the right-hand side of a [`BuildingRule`]. Values have already been mapped
/// to dense [`VIdx`] indices at this point, so symbols are plain `Copy` values: two symbols are
/// the same symbol iff they compare equal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum BuildingSymbol<StorageT> {
    Term(VIdx<StorageT>),
    Nonterm(VIdx<StorageT>),
}

impl<StorageT: Copy> BuildingSymbol<StorageT> {
    pub(crate) fn is_term(&self) -> bool {
        matches!(self, BuildingSymbol::Term(_))
    }

    pub(crate) fn vidx(&self) -> VIdx<StorageT> {
        match *self {
            BuildingSymbol::Term(vidx) | BuildingSymbol::Nonterm(vidx) => vidx,
        }
    }
}

/// One working rule of the transformation pipeline. Several `BuildingRule`s may share an `lhs`
/// (alternative right-hand sides for the same nonterminal). Passes never mutate rules in place:
/// each pass builds a brand-new collection via a [`RuleBuilder`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct BuildingRule<StorageT> {
    pub(crate) lhs: VIdx<StorageT>,
    pub(crate) rhs: Vec<BuildingSymbol<StorageT>>,
    pub(crate) temporary: bool,
}

/// The rule-synthesis ledger for one pipeline pass: it accumulates the pass's output rules and
/// hands out fresh left-hand-side ids guaranteed disjoint from every id already in use. One
/// `RuleBuilder` lives for exactly one pass and is consumed by [`RuleBuilder::into_rules`].
pub(crate) struct RuleBuilder<StorageT> {
    reserved: HashSet<VIdx<StorageT>, BuildHasherDefault<FnvHasher>>,
    generated: HashSet<VIdx<StorageT>, BuildHasherDefault<FnvHasher>>,
    rules: Vec<BuildingRule<StorageT>>,
    // Fresh ids are probed upwards from here, skipping reserved ids. Never decreases, so an id
    // handed out once is never handed out again even though it isn't added to `reserved`.
    next_candidate: usize,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> RuleBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a builder whose reserved id set is seeded with every id `existing_rules` uses,
    /// left-hand sides and right-hand-side references alike, so a fresh id can never capture an
    /// existing reference.
    pub(crate) fn with_reserved_from(existing_rules: &[BuildingRule<StorageT>]) -> Self {
        RuleBuilder {
            reserved: existing_rules
                .iter()
                .flat_map(|r| std::iter::once(r.lhs).chain(r.rhs.iter().map(|s| s.vidx())))
                .collect(),
            generated: HashSet::default(),
            rules: Vec::with_capacity(existing_rules.len()),
            next_candidate: 0,
        }
    }

    /// Carry `rule` over into this pass's output unchanged.
    pub(crate) fn add_rule(&mut self, rule: BuildingRule<StorageT>) {
        debug_assert!(
            !self.generated.contains(&rule.lhs),
            "rule left-hand side was already used for a generated rule"
        );
        self.reserved.insert(rule.lhs);
        self.rules.push(rule);
    }

    /// Carry `rule` over into this pass's output with a rewritten right-hand side, keeping its
    /// left-hand side and temporary flag.
    pub(crate) fn add_rule_with_rhs(
        &mut self,
        rule: &BuildingRule<StorageT>,
        rhs: Vec<BuildingSymbol<StorageT>>,
    ) {
        self.add_rule(BuildingRule {
            lhs: rule.lhs,
            rhs,
            temporary: rule.temporary,
        });
    }

    /// Synthesize a fresh temporary rule with the given right-hand side and return the
    /// nonterminal symbol that references it.
    pub(crate) fn fresh_temp_rule(
        &mut self,
        rhs: Vec<BuildingSymbol<StorageT>>,
    ) -> BuildingSymbol<StorageT> {
        let mut n = self.next_candidate;
        loop {
            // Check that the candidate still fits StorageT before casting, as a wrapped cast
            // would hand out an id that collides with an existing one.
            if n > num_traits::cast(StorageT::max_value()).unwrap() {
                panic!("StorageT is not big enough to store this grammar's rule ids.");
            }
            if !self.reserved.contains(&VIdx(n.as_())) {
                break;
            }
            n += 1;
        }
        self.next_candidate = n + 1;
        let lhs = VIdx(n.as_());
        self.generated.insert(lhs);
        self.rules.push(BuildingRule {
            lhs,
            rhs,
            temporary: true,
        });
        BuildingSymbol::Nonterm(lhs)
    }

    pub(crate) fn into_rules(self) -> Vec<BuildingRule<StorageT>> {
        self.rules
    }
}
