use crate::{log_trace, Address, Xn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterBlockError {
    #[error("register {index} is out of range, there are {register_count} registers")]
    IndexOutOfRange { index: Xn, register_count: usize },
    #[error("register {index} holds no value")]
    NoValue { index: Xn },
}

/// The register zone. Each register holds the heap address of one term node.
#[derive(Debug, Clone)]
pub struct RegisterBlock(Vec<Option<Address>>);

impl RegisterBlock {
    pub fn new(register_count: usize) -> Self {
        Self(vec![None; register_count])
    }

    pub fn get(&self, index: Xn) -> Result<Option<Address>, RegisterBlockError> {
        self.0
            .get(index.index())
            .copied()
            .ok_or(RegisterBlockError::IndexOutOfRange {
                index,
                register_count: self.0.len(),
            })
    }

    pub fn load(&self, index: Xn) -> Result<Address, RegisterBlockError> {
        log_trace!("Loading Register {}", index);
        self.get(index)?
            .ok_or(RegisterBlockError::NoValue { index })
    }

    pub fn store(&mut self, index: Xn, address: Address) -> Result<(), RegisterBlockError> {
        log_trace!("Storing {} in Register {}", address, index);
        let register_count = self.0.len();
        let register = self
            .0
            .get_mut(index.index())
            .ok_or(RegisterBlockError::IndexOutOfRange {
                index,
                register_count,
            })?;
        *register = Some(address);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.0.fill(None);
    }

    pub fn live(&self) -> impl Iterator<Item = (Xn, Address)> + '_ {
        (0..)
            .zip(&self.0)
            .filter_map(|(xn, register)| Some((Xn { xn }, (*register)?)))
    }
}
