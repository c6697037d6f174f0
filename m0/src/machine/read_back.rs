use std::collections::HashMap;

use arcstr::ArcStr;

use super::{Cell, Error, Machine, MemoryError};
use crate::{Address, Arity, Term, TermList};

struct ReadBack<'a> {
    machine: &'a Machine,
    variable_names: HashMap<Address, ArcStr>,
    ancestors: Vec<Address>,
}

impl<'a> ReadBack<'a> {
    fn read(&mut self, address: Address) -> Result<Term, Error> {
        let machine = self.machine;
        let memory = &machine.memory;
        let address = memory.deref(address)?;

        match memory.get(address)? {
            Cell::Reference(_) => Ok(Term::Variable {
                name: self
                    .variable_names
                    .get(&address)
                    .cloned()
                    .unwrap_or_else(|| arcstr::format!("_G{address}")),
            }),
            Cell::Structure(functor_address) => {
                if self.ancestors.contains(&functor_address) {
                    return Ok(Term::variable(arcstr::format!("_S{functor_address}")));
                }

                let (f, n) = memory.functor_at(functor_address)?;

                let name = machine
                    .functors
                    .lookup(f)
                    .map(|(name, _)| name.clone())
                    .ok_or(Error::UnknownFunctor(f))?;

                if n == Arity::ZERO {
                    return Ok(Term::Atom { name });
                }

                self.ancestors.push(functor_address);

                let terms = (1..=n.index())
                    .map(|i| self.read(functor_address.offset(i)))
                    .collect::<Result<TermList, _>>()?;

                self.ancestors.pop();

                Ok(Term::Structure { name, terms })
            }
            Cell::Functor(..) => Err(MemoryError::UnexpectedFunctor { address }.into()),
        }
    }
}

impl Machine {
    /// Unbound query variables are named after the first query variable sharing them.
    fn variable_names(&self) -> Result<HashMap<Address, ArcStr>, MemoryError> {
        let mut names = HashMap::new();

        for (name, &address) in &self.query_variables {
            names
                .entry(self.memory.deref(address)?)
                .or_insert_with(|| name.clone());
        }

        Ok(names)
    }

    /// Decode the term at `address`, following bindings.
    ///
    /// A structure which contains itself is cut short with a `_S<address>` variable.
    pub fn read_term(&self, address: Address) -> Result<Term, Error> {
        ReadBack {
            machine: self,
            variable_names: self.variable_names()?,
            ancestors: Vec::new(),
        }
        .read(address)
    }

    /// The term built by the last query, as it stands after unification.
    pub fn query_term(&self) -> Result<Option<Term>, Error> {
        self.query_root
            .map(|address| self.read_term(address))
            .transpose()
    }

    /// What each variable of the last query is bound to.
    pub fn bindings(&self) -> Result<Vec<(ArcStr, Term)>, Error> {
        self.query_variables
            .iter()
            .map(|(name, &address)| Ok((name.clone(), self.read_term(address)?)))
            .collect()
    }

    pub fn binding(&self, name: &str) -> Result<Option<Term>, Error> {
        self.query_variables
            .get(name)
            .map(|&address| self.read_term(address))
            .transpose()
    }
}
