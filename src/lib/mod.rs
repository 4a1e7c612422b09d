#![allow(clippy::cognitive_complexity)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! A library for transforming Context Free Grammars (CFG) into Chomsky Normal Form and for
//! working with the parse forests a CNF recognizer produces. The input grammar is expressed over
//! an arbitrary user value type `T` (rule names and terminal outputs both); the output grammar's
//! rules are addressed by [`RuleKey`]s, which distinguish the user's original values from the
//! nonterminals the transformation synthesizes along the way.
//!
//! CFG terminology is something of a mess, so this library sticks to the following guidelines:
//!
//!   * A *grammar* is an ordered sequence of *rules*.
//!   * A *rule* maps a name to one or more *productions*.
//!   * A *production* is an ordered sequence of *symbols*, each either a reference to a rule or
//!     a *terminal* (a value the input is matched against directly).
//!   * A rule synthesized by the transformation is *temporary*; rules of the input grammar are
//!     *original*.
//!
//! For example, in the grammar:
//!
//!   S: "a" S "b" | "a" "b";
//!
//! there is one rule (S), two productions (["a", S, "b"] and ["a", "b"]), and two terminals ("a"
//! and "b"). Transforming it with [`CnfGrammar::from_rules`] yields terminal rules for "a" and
//! "b" and a binary chain through one temporary rule, all of which [`flatten_temporaries`]
//! removes again from any parse forest built over the CNF grammar.
//!
//! The main entry points are [`CnfGrammar::from_rules`] (or
//! [`CnfGrammar::from_rules_with_storaget`] to pick a different id storage type),
//! [`flatten_temporaries`], and [`ParseForests::stats`].

pub mod cfg;
pub mod cnf;
pub mod forest;
mod idxnewtype;
#[cfg(test)]
pub(crate) mod testutil;

pub use crate::cfg::{CfgRule, CfgSymbol};
pub use crate::cnf::{
    CnfGrammar, CnfGrammarError, NonTerminalRule, RuleKey, TerminalRule,
};
pub use crate::forest::{
    FlattenError, FlattenErrorKind, ParseForestStats, ParseForests, flatten_temporaries,
};
/// Types specifically for grammar value ids and parse forest arena indices.
pub use crate::idxnewtype::{FIdx, TrIdx, VIdx};
