#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single symbol in a context-free production, over the caller's value type `T`. The same `T`
/// value may be used both as a rule name and as a terminal; the two do not clash because the
/// symbol kind is carried alongside the value.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CfgSymbol<T> {
    /// A terminal: produces `T` directly.
    Term(T),
    /// A reference to the rule named `T`.
    Nonterm(T),
}

/// One rule of a context-free grammar: a name and the productions it maps to. A grammar is a
/// sequence of `CfgRule`s; several rules may share a name, in which case their productions are
/// merged.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CfgRule<T> {
    pub name: T,
    pub prods: Vec<Vec<CfgSymbol<T>>>,
}
