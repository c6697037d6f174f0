use std::{collections::HashSet, fmt};

use crate::{log_trace, log_warn, Address, Arity, Functor, FunctorTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// A variable, unbound if it refers to its own address.
    Reference(Address),
    /// Refers to the functor cell of a structure.
    Structure(Address),
    /// Followed immediately by the structure's arguments.
    Functor(Functor, Arity),
}

impl Cell {
    pub fn display<'a>(&'a self, functors: &'a FunctorTable) -> DisplayCell<'a> {
        DisplayCell {
            cell: self,
            functors,
        }
    }
}

pub struct DisplayCell<'a> {
    cell: &'a Cell,
    functors: &'a FunctorTable,
}

impl fmt::Display for DisplayCell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.cell {
            Cell::Reference(address) => write!(f, "REF {address}"),
            Cell::Structure(address) => write!(f, "STR {address}"),
            Cell::Functor(functor, _) => write!(f, "FUN {}", self.functors.display(functor)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("heap is full ({capacity} cells)")]
    OutOfMemory { capacity: usize },
    #[error("address {address} is beyond the top of the heap at {top}")]
    AddressOutOfRange { address: Address, top: Address },
    #[error("structure points at {address} which holds {found:?} rather than a functor")]
    NotAFunctor { address: Address, found: Cell },
    #[error("functor cell at {address} reached where a term was expected")]
    UnexpectedFunctor { address: Address },
    #[error("reference chain starting at {address} does not end")]
    ReferenceCycle { address: Address },
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnificationError {
    UnificationFailure,
    Memory(MemoryError),
}

impl From<MemoryError> for UnificationError {
    fn from(inner: MemoryError) -> Self {
        Self::Memory(inner)
    }
}

/// The heap zone. Cells are only ever appended, and the only change to an existing cell is binding an unbound reference.
#[derive(Debug, Clone)]
pub struct Heap {
    cells: Vec<Cell>,
    capacity: usize,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            capacity,
        }
    }

    /// The next free address, `H`.
    pub fn top(&self) -> Address {
        Address(self.cells.len())
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn get(&self, address: Address) -> Result<Cell, MemoryError> {
        self.cells
            .get(address.index())
            .copied()
            .ok_or(MemoryError::AddressOutOfRange {
                address,
                top: self.top(),
            })
    }

    fn reserve(&self, count: usize) -> Result<(), MemoryError> {
        if self.cells.len() + count > self.capacity {
            log_warn!("Out of heap: {} cells used", self.cells.len());
            Err(MemoryError::OutOfMemory {
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }

    fn push(&mut self, cell: Cell) -> Result<Address, MemoryError> {
        self.reserve(1)?;
        let address = self.top();
        log_trace!("Heap {} := {:?}", address, cell);
        self.cells.push(cell);
        Ok(address)
    }

    pub fn new_variable(&mut self) -> Result<Address, MemoryError> {
        let address = self.top();
        self.push(Cell::Reference(address))
    }

    /// Write a structure cell and its functor cell, returning the address of the structure cell.
    pub fn new_structure(&mut self, f: Functor, n: Arity) -> Result<Address, MemoryError> {
        self.reserve(2)?;
        let address = self.top();
        self.push(Cell::Structure(address.offset(1)))?;
        self.push(Cell::Functor(f, n))?;
        Ok(address)
    }

    /// Append a copy of the cell at `address`.
    pub fn push_copy(&mut self, address: Address) -> Result<Address, MemoryError> {
        match self.get(address)? {
            Cell::Functor(..) => Err(MemoryError::UnexpectedFunctor { address }),
            cell => self.push(cell),
        }
    }

    pub fn deref(&self, mut address: Address) -> Result<Address, MemoryError> {
        let start = address;

        for _ in 0..=self.cells.len() {
            match self.get(address)? {
                Cell::Reference(target) if target != address => address = target,
                _ => return Ok(address),
            }
        }

        Err(MemoryError::ReferenceCycle { address: start })
    }

    pub fn is_unbound(&self, address: Address) -> Result<bool, MemoryError> {
        Ok(self.get(address)? == Cell::Reference(address))
    }

    pub fn functor_at(&self, address: Address) -> Result<(Functor, Arity), MemoryError> {
        match self.get(address)? {
            Cell::Functor(f, n) => Ok((f, n)),
            found => Err(MemoryError::NotAFunctor { address, found }),
        }
    }

    /// Point one unbound reference at the other address. If both are unbound, the younger one is bound.
    pub fn bind(&mut self, a1: Address, a2: Address) -> Result<(), UnificationError> {
        let (variable, value) = match (self.is_unbound(a1)?, self.is_unbound(a2)?) {
            (true, true) if a1 < a2 => (a2, a1),
            (true, _) => (a1, a2),
            (false, true) => (a2, a1),
            (false, false) => {
                log_trace!("Neither {} nor {} is unbound", a1, a2);
                return Err(UnificationError::UnificationFailure);
            }
        };

        if let Cell::Functor(..) = self.get(value)? {
            return Err(MemoryError::UnexpectedFunctor { address: value }.into());
        }

        log_trace!("Binding {} to {}", variable, value);

        self.cells[variable.index()] = Cell::Reference(value);

        Ok(())
    }

    /// Without an occurs check terms may be cyclic, so each pair of structures is unified at most once.
    pub fn unify(&mut self, a1: Address, a2: Address) -> Result<(), UnificationError> {
        log_trace!("Unifying {} and {}", a1, a2);

        let mut pending = vec![(a1, a2)];
        let mut unified_structures = HashSet::new();

        while let Some((a1, a2)) = pending.pop() {
            let d1 = self.deref(a1)?;
            let d2 = self.deref(a2)?;

            if d1 == d2 {
                continue;
            }

            match (self.get(d1)?, self.get(d2)?) {
                (Cell::Functor(..), _) => {
                    return Err(MemoryError::UnexpectedFunctor { address: d1 }.into())
                }
                (_, Cell::Functor(..)) => {
                    return Err(MemoryError::UnexpectedFunctor { address: d2 }.into())
                }
                (Cell::Reference(_), _) | (_, Cell::Reference(_)) => self.bind(d1, d2)?,
                (Cell::Structure(s1), Cell::Structure(s2)) => {
                    if !unified_structures.insert((s1.min(s2), s1.max(s2))) {
                        continue;
                    }

                    let (f1, n1) = self.functor_at(s1)?;
                    let (f2, n2) = self.functor_at(s2)?;

                    if (f1, n1) != (f2, n2) {
                        log_trace!("Functor mismatch {}/{} and {}/{}", f1, n1, f2, n2);
                        return Err(UnificationError::UnificationFailure);
                    }

                    pending.extend((1..=n1.index()).map(|i| (s1.offset(i), s2.offset(i))));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: Functor = Functor(0);
    const G: Functor = Functor(1);
    const A: Functor = Functor(2);

    fn atom(heap: &mut Heap, f: Functor) -> Address {
        heap.new_structure(f, Arity(0)).unwrap()
    }

    fn unary(heap: &mut Heap, f: Functor, argument: Address) -> Address {
        let address = heap.new_structure(f, Arity(1)).unwrap();
        heap.push_copy(argument).unwrap();
        address
    }

    #[test]
    fn structure_layout() {
        let mut heap = Heap::new(16);

        let a = atom(&mut heap, A);
        let f = unary(&mut heap, F, a);

        assert_eq!(
            heap.cells(),
            [
                Cell::Structure(Address(1)),
                Cell::Functor(A, Arity(0)),
                Cell::Structure(Address(3)),
                Cell::Functor(F, Arity(1)),
                Cell::Structure(Address(1)),
            ]
        );
        assert_eq!(f, Address(2));
        assert_eq!(heap.top(), Address(5));
    }

    #[test]
    fn deref_follows_chains() {
        let mut heap = Heap::new(16);

        let v0 = heap.new_variable().unwrap();
        let v1 = heap.new_variable().unwrap();
        let v2 = heap.new_variable().unwrap();
        let a = atom(&mut heap, A);

        assert_eq!(heap.deref(v2), Ok(v2));

        heap.bind(v1, v0).unwrap();
        heap.bind(v2, v1).unwrap();

        assert_eq!(heap.deref(v2), Ok(v0));

        heap.bind(v0, a).unwrap();

        assert_eq!(heap.deref(v2), Ok(a));
        assert!(!heap.is_unbound(v0).unwrap());
    }

    #[test]
    fn deref_terminates_on_random_chains() {
        for _ in 0..100 {
            let mut heap = Heap::new(256);
            let variables = (0..32)
                .map(|_| heap.new_variable().unwrap())
                .collect::<Vec<_>>();

            for _ in 0..64 {
                let a1 = variables[rand::random::<usize>() % variables.len()];
                let a2 = variables[rand::random::<usize>() % variables.len()];

                heap.unify(a1, a2).unwrap();
            }

            for &variable in &variables {
                let root = heap.deref(variable).unwrap();
                assert!(heap.is_unbound(root).unwrap());
            }
        }
    }

    #[test]
    fn younger_variable_is_bound() {
        let mut heap = Heap::new(16);

        let v0 = heap.new_variable().unwrap();
        let v1 = heap.new_variable().unwrap();

        heap.bind(v0, v1).unwrap();

        assert_eq!(heap.get(v1), Ok(Cell::Reference(v0)));
        assert!(heap.is_unbound(v0).unwrap());
    }

    #[test]
    fn binding_two_values_fails() {
        let mut heap = Heap::new(16);

        let a = atom(&mut heap, A);
        let g = atom(&mut heap, G);

        assert_eq!(heap.bind(a, g), Err(UnificationError::UnificationFailure));
    }

    #[test]
    fn unify_binds_nested_variables() {
        let mut heap = Heap::new(32);

        let a = atom(&mut heap, A);
        let v = heap.new_variable().unwrap();
        let f_v = unary(&mut heap, F, v);
        let f_a = unary(&mut heap, F, a);

        heap.unify(f_v, f_a).unwrap();

        let resolved = heap.deref(v).unwrap();

        assert_eq!(heap.get(resolved), heap.get(a));
        assert!(!heap.is_unbound(v).unwrap());
    }

    #[test]
    fn unify_terminates_on_cyclic_structures() {
        let mut heap = Heap::new(32);

        let v1 = heap.new_variable().unwrap();
        let f1 = unary(&mut heap, F, v1);
        heap.bind(v1, f1).unwrap();

        let v2 = heap.new_variable().unwrap();
        let f2 = unary(&mut heap, F, v2);
        heap.bind(v2, f2).unwrap();

        let g = unary(&mut heap, G, v1);

        assert_eq!(heap.unify(f1, f2), Ok(()));
        assert_eq!(heap.unify(v1, v2), Ok(()));
        assert_eq!(heap.unify(f1, g), Err(UnificationError::UnificationFailure));
    }

    #[test]
    fn unify_is_idempotent() {
        let mut heap = Heap::new(32);

        let a = atom(&mut heap, A);
        let v = heap.new_variable().unwrap();

        heap.unify(v, a).unwrap();
        let cells = heap.cells().to_vec();
        heap.unify(v, a).unwrap();

        assert_eq!(heap.cells(), cells);
    }

    #[test]
    fn unify_detects_mismatch() {
        let mut heap = Heap::new(32);

        let a = atom(&mut heap, A);
        let v = heap.new_variable().unwrap();
        let f_a = unary(&mut heap, F, a);
        let g_a = unary(&mut heap, G, a);
        let f_ga = unary(&mut heap, F, g_a);

        assert_eq!(heap.unify(f_a, g_a), Err(UnificationError::UnificationFailure));

        heap.unify(v, f_a).unwrap();

        assert_eq!(heap.unify(v, f_ga), Err(UnificationError::UnificationFailure));
    }

    #[test]
    fn arity_mismatch_fails() {
        let mut heap = Heap::new(32);

        let a = atom(&mut heap, A);
        let f1 = unary(&mut heap, F, a);
        let f2 = heap.new_structure(F, Arity(2)).unwrap();
        heap.push_copy(a).unwrap();
        heap.push_copy(a).unwrap();

        assert_eq!(heap.unify(f1, f2), Err(UnificationError::UnificationFailure));
    }

    #[test]
    fn heap_capacity_is_enforced() {
        let mut heap = Heap::new(3);

        heap.new_variable().unwrap();
        heap.new_variable().unwrap();

        assert_eq!(
            heap.new_structure(F, Arity(0)),
            Err(MemoryError::OutOfMemory { capacity: 3 })
        );
        assert_eq!(heap.top(), Address(2));
    }

    #[test]
    fn bad_addresses_are_reported() {
        let mut heap = Heap::new(8);

        let a = atom(&mut heap, A);

        assert_eq!(
            heap.get(Address(5)),
            Err(MemoryError::AddressOutOfRange {
                address: Address(5),
                top: Address(2)
            })
        );
        assert_eq!(
            heap.push_copy(a.offset(1)),
            Err(MemoryError::UnexpectedFunctor {
                address: Address(1)
            })
        );
    }
}
