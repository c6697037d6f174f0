use std::collections::{HashMap, VecDeque};

use arcstr::ArcStr;

use super::CompileError;
use crate::{log_trace, Arity, Functor, FunctorTable, Term, Xn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterRow {
    Variable { name: ArcStr },
    Structure { f: Functor, n: Arity, terms: Vec<Xn> },
}

impl RegisterRow {
    pub fn is_structure(&self) -> bool {
        matches!(self, Self::Structure { .. })
    }
}

/// One row per register, indexed by register number. The term being compiled is always in `X0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    rows: Vec<RegisterRow>,
}

impl RegisterMap {
    pub const ROOT: Xn = Xn { xn: 0 };

    pub fn get(&self, xn: Xn) -> Result<&RegisterRow, CompileError> {
        self.rows
            .get(xn.index())
            .ok_or(CompileError::UnallocatedRegister(xn))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = (&ArcStr, Xn)> + '_ {
        (0..).zip(&self.rows).filter_map(|(xn, row)| match row {
            RegisterRow::Variable { name } => Some((name, Xn { xn })),
            RegisterRow::Structure { .. } => None,
        })
    }
}

struct QueuedStructure<'t> {
    xn: Xn,
    name: &'t ArcStr,
    terms: &'t [Term],
}

struct RegisterAllocationState<'t> {
    rows: Vec<Option<RegisterRow>>,
    variables: HashMap<&'t ArcStr, Xn>,
    queue: VecDeque<QueuedStructure<'t>>,
    capacity: usize,
}

impl<'t> RegisterAllocationState<'t> {
    fn next_free_register(&mut self) -> Result<Xn, CompileError> {
        let index = self.rows.len();
        let capacity = self.capacity;

        let xn = u16::try_from(index)
            .ok()
            .filter(|_| index < capacity)
            .ok_or(CompileError::OutOfRegisters { capacity })?;

        self.rows.push(None);

        Ok(Xn { xn })
    }

    fn reserve_variable_register(&mut self, name: &'t ArcStr) -> Result<Xn, CompileError> {
        if let Some(&xn) = self.variables.get(name) {
            return Ok(xn);
        }

        let xn = self.next_free_register()?;
        log_trace!("Allocated {} for variable {}", xn, name);

        self.rows[xn.index()] = Some(RegisterRow::Variable { name: name.clone() });
        self.variables.insert(name, xn);

        Ok(xn)
    }

    fn queue_structure(&mut self, name: &'t ArcStr, terms: &'t [Term]) -> Result<Xn, CompileError> {
        let xn = self.next_free_register()?;
        log_trace!("Allocated {} for structure {}", xn, name);

        self.queue.push_back(QueuedStructure { xn, name, terms });

        Ok(xn)
    }

    fn allocate_term(&mut self, term: &'t Term) -> Result<Xn, CompileError> {
        match term {
            Term::Variable { name } => self.reserve_variable_register(name),
            Term::Atom { name } => self.queue_structure(name, &[]),
            Term::Structure { name, terms } => self.queue_structure(name, terms),
        }
    }
}

/// Assign registers breadth first: sibling structures are numbered before any of their arguments.
pub fn allocate_registers(
    term: &Term,
    functors: &mut FunctorTable,
    capacity: usize,
) -> Result<RegisterMap, CompileError> {
    let mut state = RegisterAllocationState {
        rows: Vec::new(),
        variables: HashMap::new(),
        queue: VecDeque::new(),
        capacity,
    };

    state.allocate_term(term)?;

    while let Some(QueuedStructure { xn, name, terms }) = state.queue.pop_front() {
        let n = u8::try_from(terms.len())
            .map(Arity)
            .map_err(|_| CompileError::ArityTooLarge {
                name: name.clone(),
                arity: terms.len(),
            })?;

        let f = functors.intern(name, n)?;

        let terms = terms
            .iter()
            .map(|term| state.allocate_term(term))
            .collect::<Result<Vec<_>, _>>()?;

        state.rows[xn.index()] = Some(RegisterRow::Structure { f, n, terms });
    }

    let rows = (0..)
        .zip(state.rows)
        .map(|(xn, row)| row.ok_or(CompileError::UnallocatedRegister(Xn { xn })))
        .collect::<Result<_, _>>()?;

    Ok(RegisterMap { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(xn: u16) -> Xn {
        Xn { xn }
    }

    fn allocate(term: &Term) -> (RegisterMap, FunctorTable) {
        let mut functors = FunctorTable::new(64);
        let map = allocate_registers(term, &mut functors, 64).unwrap();
        (map, functors)
    }

    fn structure(functors: &FunctorTable, map: &RegisterMap, xn: Xn) -> (String, Vec<Xn>) {
        match map.get(xn).unwrap() {
            RegisterRow::Structure { f, terms, .. } => {
                (functors.display(*f).to_string(), terms.clone())
            }
            row => panic!("{xn} is {row:?}"),
        }
    }

    fn variable(map: &RegisterMap, xn: Xn) -> &str {
        match map.get(xn).unwrap() {
            RegisterRow::Variable { name } => name.as_str(),
            row => panic!("{xn} is {row:?}"),
        }
    }

    #[test]
    fn breadth_first_numbering() {
        // p(Z, h(Z, W), f(W))
        let term = Term::structure(
            "p",
            [
                Term::variable("Z"),
                Term::structure("h", [Term::variable("Z"), Term::variable("W")]),
                Term::structure("f", [Term::variable("W")]),
            ],
        );

        let (map, functors) = allocate(&term);

        assert_eq!(map.len(), 5);
        assert_eq!(
            structure(&functors, &map, x(0)),
            ("p/3".to_string(), vec![x(1), x(2), x(3)])
        );
        assert_eq!(variable(&map, x(1)), "Z");
        assert_eq!(
            structure(&functors, &map, x(2)),
            ("h/2".to_string(), vec![x(1), x(4)])
        );
        assert_eq!(
            structure(&functors, &map, x(3)),
            ("f/1".to_string(), vec![x(4)])
        );
        assert_eq!(variable(&map, x(4)), "W");
    }

    #[test]
    fn siblings_before_children() {
        // p(f(X), h(Y, f(a)), Y)
        let term = Term::structure(
            "p",
            [
                Term::structure("f", [Term::variable("X")]),
                Term::structure(
                    "h",
                    [
                        Term::variable("Y"),
                        Term::structure("f", [Term::atom("a")]),
                    ],
                ),
                Term::variable("Y"),
            ],
        );

        let (map, functors) = allocate(&term);

        assert_eq!(map.len(), 7);
        assert_eq!(
            structure(&functors, &map, x(0)),
            ("p/3".to_string(), vec![x(1), x(2), x(3)])
        );
        assert_eq!(
            structure(&functors, &map, x(1)),
            ("f/1".to_string(), vec![x(4)])
        );
        assert_eq!(
            structure(&functors, &map, x(2)),
            ("h/2".to_string(), vec![x(3), x(5)])
        );
        assert_eq!(variable(&map, x(3)), "Y");
        assert_eq!(variable(&map, x(4)), "X");
        assert_eq!(
            structure(&functors, &map, x(5)),
            ("f/1".to_string(), vec![x(6)])
        );
        assert_eq!(structure(&functors, &map, x(6)), ("a/0".to_string(), vec![]));
    }

    #[test]
    fn repeated_structures_get_their_own_registers() {
        let term = Term::structure("g", [Term::atom("a"), Term::atom("a")]);

        let (map, functors) = allocate(&term);

        assert_eq!(
            structure(&functors, &map, x(0)),
            ("g/2".to_string(), vec![x(1), x(2)])
        );
        assert_eq!(functors.len(), 2);
    }

    #[test]
    fn bare_variable_is_root() {
        let (map, _) = allocate(&Term::variable("X"));

        assert_eq!(map.len(), 1);
        assert_eq!(variable(&map, RegisterMap::ROOT), "X");
        assert_eq!(
            map.variables().collect::<Vec<_>>(),
            vec![(&ArcStr::from("X"), x(0))]
        );
    }

    #[test]
    fn register_capacity_is_enforced() {
        let term = Term::structure("f", [Term::variable("X"), Term::variable("Y")]);
        let mut functors = FunctorTable::new(64);

        assert_eq!(
            allocate_registers(&term, &mut functors, 2),
            Err(CompileError::OutOfRegisters { capacity: 2 })
        );
    }

    #[test]
    fn arity_is_limited() {
        let term = Term::structure("big", (0..300).map(|_| Term::atom("a")));
        let mut functors = FunctorTable::new(64);

        assert_eq!(
            allocate_registers(&term, &mut functors, 1024),
            Err(CompileError::ArityTooLarge {
                name: "big".into(),
                arity: 300
            })
        );
    }
}
