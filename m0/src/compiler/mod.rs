use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use arcstr::ArcStr;

use crate::{log_debug, FunctorTable, Term, Xn};

mod allocation;
mod instructions;

pub use allocation::{allocate_registers, RegisterMap, RegisterRow};
pub use instructions::{DisplayInstruction, Instruction};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("term needs more than the {capacity} available registers")]
    OutOfRegisters { capacity: usize },
    #[error("{name} has {arity} arguments, at most 255 are supported")]
    ArityTooLarge { name: ArcStr, arity: usize },
    #[error("functor table is full ({capacity} functors)")]
    OutOfFunctors { capacity: usize },
    #[error("code zone is full ({capacity} instructions)")]
    OutOfCode { capacity: usize },
    #[error("register {0} was used but never allocated")]
    UnallocatedRegister(Xn),
}

/// Compiled instructions, plus the register each named variable of the source term lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
    variables: BTreeMap<ArcStr, Xn>,
}

impl InstructionSequence {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            variables: BTreeMap::new(),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = (&ArcStr, Xn)> + '_ {
        self.variables.iter().map(|(name, &xn)| (name, xn))
    }

    pub fn display<'a>(&'a self, functors: &'a FunctorTable) -> DisplayInstructionSequence<'a> {
        DisplayInstructionSequence {
            sequence: self,
            functors,
        }
    }
}

impl std::ops::Deref for InstructionSequence {
    type Target = [Instruction];

    fn deref(&self) -> &Self::Target {
        self.instructions.as_ref()
    }
}

pub struct DisplayInstructionSequence<'a> {
    sequence: &'a InstructionSequence,
    functors: &'a FunctorTable,
}

impl fmt::Display for DisplayInstructionSequence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in self.sequence.iter() {
            writeln!(f, "{}", instruction.display(self.functors))?;
        }

        Ok(())
    }
}

#[derive(Default)]
struct KnownRegisters(HashSet<Xn>);

impl KnownRegisters {
    fn contains(&self, xn: Xn) -> bool {
        self.0.contains(&xn)
    }

    /// Returns true if `xn` was not already known.
    fn insert(&mut self, xn: Xn) -> bool {
        self.0.insert(xn)
    }
}

struct Emitter<'a> {
    map: &'a RegisterMap,
    known: KnownRegisters,
    instructions: Vec<Instruction>,
}

impl<'a> Emitter<'a> {
    fn new(map: &'a RegisterMap) -> Self {
        Self {
            map,
            known: KnownRegisters::default(),
            instructions: Vec::new(),
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn query_register(&mut self, xn: Xn) -> Result<(), CompileError> {
        let map = self.map;

        if self.known.contains(xn) {
            self.emit(Instruction::SetValue { xn });
            return Ok(());
        }

        match map.get(xn)? {
            RegisterRow::Variable { .. } => {
                self.known.insert(xn);
                self.emit(Instruction::SetVariable { xn });
            }
            &RegisterRow::Structure { f, n, ref terms } => {
                for &term in terms {
                    if !self.known.contains(term) && map.get(term)?.is_structure() {
                        self.query_register(term)?;
                    }
                }

                self.known.insert(xn);
                self.emit(Instruction::PutStructure { f, n, xn });

                for &term in terms {
                    self.query_register(term)?;
                }
            }
        }

        Ok(())
    }

    fn program_structure(&mut self, xn: Xn) -> Result<(), CompileError> {
        let map = self.map;

        let &RegisterRow::Structure { f, n, ref terms } = map.get(xn)? else {
            return Ok(());
        };

        self.known.insert(xn);
        self.emit(Instruction::GetStructure { f, n, xn });

        for &term in terms {
            let instruction = if self.known.insert(term) {
                Instruction::UnifyVariable { xn: term }
            } else {
                Instruction::UnifyValue { xn: term }
            };

            self.emit(instruction);
        }

        for &term in terms {
            self.program_structure(term)?;
        }

        Ok(())
    }

    fn finish(self) -> InstructionSequence {
        InstructionSequence {
            instructions: self.instructions,
            variables: self
                .map
                .variables()
                .map(|(name, xn)| (name.clone(), xn))
                .collect(),
        }
    }
}

/// Compile a term which builds itself on the heap, leaving its address in `X0`.
pub fn compile_query(
    term: &Term,
    functors: &mut FunctorTable,
    register_capacity: usize,
) -> Result<InstructionSequence, CompileError> {
    let map = allocate_registers(term, functors, register_capacity)?;
    let mut emitter = Emitter::new(&map);

    emitter.query_register(RegisterMap::ROOT)?;

    let query = emitter.finish();
    log_debug!("Compiled query {} into {} instructions", term, query.len());

    Ok(query)
}

/// Compile a term which matches the term addressed by `X0`, building wherever it meets an unbound variable.
///
/// A bare variable compiles to nothing, as `X0` already holds whatever it is matched against.
pub fn compile_program(
    term: &Term,
    functors: &mut FunctorTable,
    register_capacity: usize,
) -> Result<InstructionSequence, CompileError> {
    let map = allocate_registers(term, functors, register_capacity)?;
    let mut emitter = Emitter::new(&map);

    emitter.program_structure(RegisterMap::ROOT)?;

    let program = emitter.finish();
    log_debug!("Compiled program {} into {} instructions", term, program.len());

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arity, Functor};

    fn x(xn: u16) -> Xn {
        Xn { xn }
    }

    fn listing(sequence: &InstructionSequence, functors: &FunctorTable) -> Vec<String> {
        sequence
            .iter()
            .map(|instruction| instruction.display(functors).to_string())
            .collect()
    }

    #[test]
    fn query_builds_children_first() {
        // p(Z, h(Z, W), f(W))
        let term = Term::structure(
            "p",
            [
                Term::variable("Z"),
                Term::structure("h", [Term::variable("Z"), Term::variable("W")]),
                Term::structure("f", [Term::variable("W")]),
            ],
        );
        let mut functors = FunctorTable::new(64);

        let query = compile_query(&term, &mut functors, 64).unwrap();

        assert_eq!(
            listing(&query, &functors),
            [
                "put_structure h/2, X2",
                "set_variable X1",
                "set_variable X4",
                "put_structure f/1, X3",
                "set_value X4",
                "put_structure p/3, X0",
                "set_value X1",
                "set_value X2",
                "set_value X3",
            ]
        );
        assert_eq!(
            query.variables().collect::<Vec<_>>(),
            vec![(&ArcStr::from("W"), x(4)), (&ArcStr::from("Z"), x(1))]
        );
    }

    #[test]
    fn program_matches_parent_first() {
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
        let mut functors = FunctorTable::new(64);

        let program = compile_program(&term, &mut functors, 64).unwrap();

        assert_eq!(
            listing(&program, &functors),
            [
                "get_structure p/3, X0",
                "unify_variable X1",
                "unify_variable X2",
                "unify_variable X3",
                "get_structure f/1, X1",
                "unify_variable X4",
                "get_structure h/2, X2",
                "unify_value X3",
                "unify_variable X5",
                "get_structure f/1, X5",
                "unify_variable X6",
                "get_structure a/0, X6",
            ]
        );
    }

    #[test]
    fn repeated_variable_in_query_and_program() {
        let term = Term::structure("f", [Term::variable("X"), Term::variable("X")]);
        let mut functors = FunctorTable::new(64);

        let query = compile_query(&term, &mut functors, 64).unwrap();
        let program = compile_program(&term, &mut functors, 64).unwrap();

        let f = Functor(0);
        let n = Arity(2);

        assert_eq!(
            &*query,
            [
                Instruction::PutStructure { f, n, xn: x(0) },
                Instruction::SetVariable { xn: x(1) },
                Instruction::SetValue { xn: x(1) },
            ]
        );
        assert_eq!(
            &*program,
            [
                Instruction::GetStructure { f, n, xn: x(0) },
                Instruction::UnifyVariable { xn: x(1) },
                Instruction::UnifyValue { xn: x(1) },
            ]
        );
    }

    #[test]
    fn bare_variables() {
        let term = Term::variable("X");
        let mut functors = FunctorTable::new(64);

        let query = compile_query(&term, &mut functors, 64).unwrap();
        let program = compile_program(&term, &mut functors, 64).unwrap();

        assert_eq!(&*query, [Instruction::SetVariable { xn: x(0) }]);
        assert!(program.is_empty());
        assert!(functors.is_empty());
    }

    #[test]
    fn atoms() {
        let term = Term::atom("a");
        let mut functors = FunctorTable::new(64);

        let query = compile_query(&term, &mut functors, 64).unwrap();
        let program = compile_program(&term, &mut functors, 64).unwrap();

        assert_eq!(listing(&query, &functors), ["put_structure a/0, X0"]);
        assert_eq!(listing(&program, &functors), ["get_structure a/0, X0"]);
    }

    #[test]
    fn sequence_listing() {
        let term = Term::structure("g", [Term::variable("X")]);
        let mut functors = FunctorTable::new(64);

        let query = compile_query(&term, &mut functors, 64).unwrap();

        assert_eq!(
            query.display(&functors).to_string(),
            "put_structure g/1, X0\nset_variable X1\n"
        );
    }
}
