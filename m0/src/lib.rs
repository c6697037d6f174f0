//! An M0 abstract machine: terms are compiled into instructions which build a query term on a flat heap of tagged
//! cells and then match a program term against it.

mod logging;

mod basic_types;
pub mod compiler;
mod functors;
pub mod machine;
mod term;

pub use basic_types::{Address, Arity, Functor, Xn};
pub use compiler::{CompileError, Instruction, InstructionSequence};
pub use functors::FunctorTable;
pub use machine::{Capacities, Cell, Error, Machine};
pub use term::{Term, TermList};
