use std::fmt;

use crate::{Arity, Functor, FunctorTable, Xn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PutStructure { f: Functor, n: Arity, xn: Xn },
    SetVariable { xn: Xn },
    SetValue { xn: Xn },
    GetStructure { f: Functor, n: Arity, xn: Xn },
    UnifyVariable { xn: Xn },
    UnifyValue { xn: Xn },
}

impl Instruction {
    pub fn display<'a>(&'a self, functors: &'a FunctorTable) -> DisplayInstruction<'a> {
        DisplayInstruction {
            instruction: self,
            functors,
        }
    }
}

pub struct DisplayInstruction<'a> {
    instruction: &'a Instruction,
    functors: &'a FunctorTable,
}

impl fmt::Display for DisplayInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functors = self.functors;

        match *self.instruction {
            Instruction::PutStructure { f: functor, xn, .. } => {
                write!(f, "put_structure {}, {xn}", functors.display(functor))
            }
            Instruction::SetVariable { xn } => write!(f, "set_variable {xn}"),
            Instruction::SetValue { xn } => write!(f, "set_value {xn}"),
            Instruction::GetStructure { f: functor, xn, .. } => {
                write!(f, "get_structure {}, {xn}", functors.display(functor))
            }
            Instruction::UnifyVariable { xn } => write!(f, "unify_variable {xn}"),
            Instruction::UnifyValue { xn } => write!(f, "unify_value {xn}"),
        }
    }
}
