use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
};

use arcstr::ArcStr;

use crate::{log_trace, log_warn, Arity, CompileError, Functor};

/// Append-only interning of `(name, arity)` pairs. Ids are dense and never reused until [`FunctorTable::clear`].
#[derive(Debug, Clone)]
pub struct FunctorTable {
    ids: HashMap<(ArcStr, Arity), Functor>,
    entries: Vec<(ArcStr, Arity)>,
    capacity: usize,
}

impl FunctorTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashMap::new(),
            entries: Vec::new(),
            capacity: capacity.min(usize::from(u16::MAX) + 1),
        }
    }

    pub fn intern(&mut self, name: &ArcStr, arity: Arity) -> Result<Functor, CompileError> {
        let next_id = self.entries.len();

        match self.ids.entry((name.clone(), arity)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let capacity = self.capacity;
                let id = u16::try_from(next_id)
                    .ok()
                    .filter(|_| next_id < capacity)
                    .ok_or_else(|| {
                        log_warn!("Functor table full, cannot intern {}/{}", name, arity);
                        CompileError::OutOfFunctors { capacity }
                    })?;

                let functor = Functor(id);
                log_trace!("Interned {}/{} as {}", name, arity, functor);

                self.entries.push((name.clone(), arity));
                Ok(*entry.insert(functor))
            }
        }
    }

    pub fn lookup(&self, functor: Functor) -> Option<(&ArcStr, Arity)> {
        self.entries
            .get(functor.index())
            .map(|(name, arity)| (name, *arity))
    }

    pub fn display(&self, functor: Functor) -> DisplayFunctor<'_> {
        DisplayFunctor {
            functors: self,
            functor,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Functor, &ArcStr, Arity)> + '_ {
        (0..)
            .zip(&self.entries)
            .map(|(id, (name, arity))| (Functor(id), name, *arity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.entries.clear();
    }
}

pub struct DisplayFunctor<'a> {
    functors: &'a FunctorTable,
    functor: Functor,
}

impl fmt::Display for DisplayFunctor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.functors.lookup(self.functor) {
            Some((name, arity)) => write!(f, "{name}/{arity}"),
            None => write!(f, "<unknown functor {}>", self.functor),
        }
    }
}
