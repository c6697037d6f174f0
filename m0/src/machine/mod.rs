use std::collections::BTreeMap;

use arcstr::ArcStr;

use crate::{
    compiler::{self, CompileError, Instruction, InstructionSequence},
    log_debug, log_error, log_info, log_trace, log_warn, Address, Arity, Functor, FunctorTable,
    Term, Xn,
};

mod dump;
mod heap;
mod read_back;
mod registers;
mod structure_iteration;

pub use dump::Dump;
pub use heap::{Cell, DisplayCell, MemoryError};
pub use registers::RegisterBlockError;
pub use structure_iteration::Error as StructureIterationError;

use heap::{Heap, UnificationError};
use registers::RegisterBlock;
use structure_iteration::{NextTerm, ReadWriteMode, State as StructureIterationState};

/// Size of each memory zone. Running out of any of them is an error rather than an overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    pub registers: usize,
    pub code: usize,
    pub heap: usize,
    pub functors: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            registers: 128,
            code: 1024,
            heap: 4096,
            functors: 1024,
        }
    }
}

/// A fault which correct compilation never produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    RegisterBlock(#[from] RegisterBlockError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    StructureIteration(#[from] StructureIterationError),
    #[error("functor {0} is not in the functor table")]
    UnknownFunctor(Functor),
}

#[derive(Debug)]
enum ExecutionFailure {
    Failed,
    Error(Error),
}

impl From<Error> for ExecutionFailure {
    fn from(err: Error) -> Self {
        Self::Error(err)
    }
}

impl From<RegisterBlockError> for ExecutionFailure {
    fn from(err: RegisterBlockError) -> Self {
        Self::Error(Error::RegisterBlock(err))
    }
}

impl From<MemoryError> for ExecutionFailure {
    fn from(err: MemoryError) -> Self {
        Self::Error(Error::Memory(err))
    }
}

impl From<StructureIterationError> for ExecutionFailure {
    fn from(err: StructureIterationError) -> Self {
        Self::Error(Error::StructureIteration(err))
    }
}

impl From<UnificationError> for ExecutionFailure {
    fn from(err: UnificationError) -> Self {
        match err {
            UnificationError::UnificationFailure => Self::Failed,
            UnificationError::Memory(inner) => inner.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CurrentlyExecuting {
    Query,
    Program,
}

pub struct Machine {
    capacities: Capacities,
    functors: FunctorTable,
    code: Vec<Instruction>,
    registers: RegisterBlock,
    memory: Heap,
    structure_iteration_state: StructureIterationState,
    query_root: Option<Address>,
    query_variables: BTreeMap<ArcStr, Address>,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_capacities(Capacities::default())
    }

    pub fn with_capacities(capacities: Capacities) -> Self {
        Self {
            capacities,
            functors: FunctorTable::new(capacities.functors),
            code: Vec::new(),
            registers: RegisterBlock::new(capacities.registers),
            memory: Heap::new(capacities.heap),
            structure_iteration_state: StructureIterationState::new(),
            query_root: None,
            query_variables: BTreeMap::new(),
        }
    }

    pub fn capacities(&self) -> Capacities {
        self.capacities
    }

    pub fn functors(&self) -> &FunctorTable {
        &self.functors
    }

    pub fn heap(&self) -> &[Cell] {
        self.memory.cells()
    }

    /// Return to the state of a freshly created machine.
    pub fn reset(&mut self) {
        log_debug!("Resetting machine");

        self.functors.clear();
        self.code.clear();
        self.registers.clear();
        self.memory.clear();
        self.structure_iteration_state = StructureIterationState::new();
        self.query_root = None;
        self.query_variables.clear();
    }

    fn load_code(&mut self, sequence: &InstructionSequence) -> Result<(), CompileError> {
        if self.code.len() + sequence.len() > self.capacities.code {
            log_warn!("Code zone full, {} instructions loaded", self.code.len());
            return Err(CompileError::OutOfCode {
                capacity: self.capacities.code,
            });
        }

        self.code.extend_from_slice(sequence);

        Ok(())
    }

    pub fn compile_query(&mut self, term: &Term) -> Result<InstructionSequence, CompileError> {
        let query = compiler::compile_query(term, &mut self.functors, self.capacities.registers)?;
        self.load_code(&query)?;
        Ok(query)
    }

    pub fn compile_program(&mut self, term: &Term) -> Result<InstructionSequence, CompileError> {
        let program =
            compiler::compile_program(term, &mut self.functors, self.capacities.registers)?;
        self.load_code(&program)?;
        Ok(program)
    }

    /// Build the query term, then match the program term against it.
    ///
    /// Returns whether the two terms unify. Errors are internal faults, never a mismatch.
    pub fn run(
        &mut self,
        query: &InstructionSequence,
        program: &InstructionSequence,
    ) -> Result<bool, Error> {
        match self.execute(query, program) {
            Ok(()) => {
                log_info!("Unification succeeded");
                Ok(true)
            }
            Err(ExecutionFailure::Failed) => {
                log_info!("Unification failed");
                Ok(false)
            }
            Err(ExecutionFailure::Error(error)) => {
                log_error!("Execution error: {}", error);
                Err(error)
            }
        }
    }

    fn execute(
        &mut self,
        query: &InstructionSequence,
        program: &InstructionSequence,
    ) -> Result<(), ExecutionFailure> {
        self.registers.clear();
        self.query_root = None;
        self.query_variables.clear();

        self.structure_iteration_state.reset(ReadWriteMode::Write);
        self.execute_sequence(CurrentlyExecuting::Query, query)?;
        self.save_query_registers(query)?;

        self.structure_iteration_state.reset(ReadWriteMode::Read);
        self.execute_sequence(CurrentlyExecuting::Program, program)
    }

    fn execute_sequence(
        &mut self,
        currently_executing: CurrentlyExecuting,
        sequence: &InstructionSequence,
    ) -> Result<(), ExecutionFailure> {
        for (pc, instruction) in sequence.iter().enumerate() {
            log_debug!(
                "{:?} Instruction @{} ({:?} mode, S = {}) : {}",
                currently_executing,
                pc,
                self.structure_iteration_state.read_write_mode(),
                self.structure_iteration_state.subterm_cursor(),
                instruction.display(&self.functors)
            );

            self.execute_instruction(instruction)?;
        }

        Ok(())
    }

    fn save_query_registers(&mut self, query: &InstructionSequence) -> Result<(), ExecutionFailure> {
        if !query.is_empty() {
            self.query_root = Some(self.registers.load(Xn { xn: 0 })?);
        }

        for (name, xn) in query.variables() {
            let address = self.registers.load(xn)?;
            log_trace!("Query variable {} is at {}", name, address);
            self.query_variables.insert(name.clone(), address);
        }

        Ok(())
    }

    fn execute_instruction(&mut self, instruction: &Instruction) -> Result<(), ExecutionFailure> {
        match *instruction {
            Instruction::PutStructure { f, n, xn } => self.put_structure(f, n, xn),
            Instruction::SetVariable { xn } => {
                let address = self.memory.new_variable()?;
                self.registers.store(xn, address)?;
                Ok(())
            }
            Instruction::SetValue { xn } => {
                self.memory.push_copy(self.registers.load(xn)?)?;
                Ok(())
            }
            Instruction::GetStructure { f, n, xn } => self.get_structure(f, n, xn),
            Instruction::UnifyVariable { xn } => self.unify_variable(xn),
            Instruction::UnifyValue { xn } => self.unify_value(xn),
        }
    }

    fn put_structure(&mut self, f: Functor, n: Arity, xn: Xn) -> Result<(), ExecutionFailure> {
        let address = self.memory.new_structure(f, n)?;
        self.registers.store(xn, address)?;
        self.structure_iteration_state.start_writing(n);
        Ok(())
    }

    fn get_structure(&mut self, f: Functor, n: Arity, xn: Xn) -> Result<(), ExecutionFailure> {
        let Some(address) = self.registers.get(xn)? else {
            // Nothing to match against, so build
            return self.put_structure(f, n, xn);
        };

        let address = self.memory.deref(address)?;

        match self.memory.get(address)? {
            Cell::Reference(_) => {
                let structure = self.memory.new_structure(f, n)?;
                self.memory.bind(address, structure)?;
                self.structure_iteration_state.start_writing(n);
                Ok(())
            }
            Cell::Structure(functor_address) => {
                let found = self.memory.functor_at(functor_address)?;

                if found != (f, n) {
                    log_trace!(
                        "Expected {} but found {}",
                        self.functors.display(f),
                        self.functors.display(found.0)
                    );
                    return Err(ExecutionFailure::Failed);
                }

                self.structure_iteration_state
                    .start_reading(functor_address.offset(1), n);
                Ok(())
            }
            Cell::Functor(..) => Err(MemoryError::UnexpectedFunctor { address }.into()),
        }
    }

    fn unify_variable(&mut self, xn: Xn) -> Result<(), ExecutionFailure> {
        let address = match self.structure_iteration_state.next_term()? {
            NextTerm::Read(term_address) => term_address,
            NextTerm::Write => self.memory.new_variable()?,
        };

        self.registers.store(xn, address)?;

        Ok(())
    }

    fn unify_value(&mut self, xn: Xn) -> Result<(), ExecutionFailure> {
        let register_address = self.registers.load(xn)?;

        match self.structure_iteration_state.next_term()? {
            NextTerm::Read(term_address) => Ok(self.memory.unify(register_address, term_address)?),
            NextTerm::Write => {
                self.memory.push_copy(register_address)?;
                Ok(())
            }
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
