//! Transformation of arbitrary context-free grammars into Chomsky Normal Form.
//!
//! The entry point is [`CnfGrammar::from_rules`]; the submodules hold the intermediate rule
//! representation ([`building`]) and the transformation passes ([`transform`]).

pub(crate) mod building;
pub mod grammar;
pub(crate) mod transform;

pub use grammar::{CnfGrammar, CnfGrammarError, NonTerminalRule, RuleKey, TerminalRule};
