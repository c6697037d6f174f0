use crate::{log_trace, Address, Arity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWriteMode {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no structure has arguments left to read or write")]
    NoMoreTerms,
}

pub type Result<T> = core::result::Result<T, Error>;

/// What the next argument instruction should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTerm {
    /// Match against the argument at this address
    Read(Address),
    /// Append the argument at the heap top
    Write,
}

/// The mode, the subterm cursor `S` and the count of arguments left in the current structure.
#[derive(Debug, Clone)]
pub struct State {
    read_write_mode: ReadWriteMode,
    s: Address,
    terms_left: u8,
}

impl State {
    pub fn new() -> Self {
        Self {
            read_write_mode: ReadWriteMode::Write,
            s: Address::ZERO,
            terms_left: 0,
        }
    }

    pub fn read_write_mode(&self) -> ReadWriteMode {
        self.read_write_mode
    }

    pub fn subterm_cursor(&self) -> Address {
        self.s
    }

    pub fn reset(&mut self, read_write_mode: ReadWriteMode) {
        log_trace!("Entering {:?} mode", read_write_mode);
        *self = Self {
            read_write_mode,
            ..Self::new()
        };
    }

    pub fn start_reading(&mut self, first_term: Address, n: Arity) {
        log_trace!("Reading {} terms from {}", n, first_term);
        self.read_write_mode = ReadWriteMode::Read;
        self.s = first_term;
        self.terms_left = n.0;
    }

    pub fn start_writing(&mut self, n: Arity) {
        log_trace!("Writing {} terms", n);
        self.read_write_mode = ReadWriteMode::Write;
        self.terms_left = n.0;
    }

    /// Step past one argument of the current structure.
    pub fn next_term(&mut self) -> Result<NextTerm> {
        self.terms_left = self.terms_left.checked_sub(1).ok_or(Error::NoMoreTerms)?;

        let s = self.s;
        self.s = s.offset(1);

        Ok(match self.read_write_mode {
            ReadWriteMode::Read => NextTerm::Read(s),
            ReadWriteMode::Write => NextTerm::Write,
        })
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
