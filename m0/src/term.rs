use std::fmt;

use arcstr::ArcStr;
use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A zero-arity structure
    Atom { name: ArcStr },
    Variable { name: ArcStr },
    Structure { name: ArcStr, terms: TermList },
}

impl Term {
    pub fn atom(name: impl Into<ArcStr>) -> Self {
        Self::Atom { name: name.into() }
    }

    pub fn variable(name: impl Into<ArcStr>) -> Self {
        Self::Variable { name: name.into() }
    }

    pub fn structure(name: impl Into<ArcStr>, terms: impl IntoIterator<Item = Term>) -> Self {
        Self::Structure {
            name: name.into(),
            terms: terms.into_iter().collect(),
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Self::Atom { .. } => true,
            Self::Variable { .. } => false,
            Self::Structure { terms, .. } => terms.iter().all(Term::is_ground),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom { name } | Self::Variable { name } => fmt::Display::fmt(name, f),
            Self::Structure { name, terms } => write!(f, "{name}({terms})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TermList(Vec<Term>);

impl std::ops::Deref for TermList {
    type Target = [Term];

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl From<Vec<Term>> for TermList {
    fn from(terms: Vec<Term>) -> Self {
        Self(terms)
    }
}

impl FromIterator<Term> for TermList {
    fn from_iter<I: IntoIterator<Item = Term>>(terms: I) -> Self {
        Self(terms.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TermList {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TermList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.iter().format(", "), f)
    }
}
