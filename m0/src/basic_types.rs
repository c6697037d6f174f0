use m0_derive::IndexNewType;

/// An index into the heap zone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IndexNewType)]
pub struct Address(pub usize);

impl Address {
    pub const ZERO: Self = Self(0);

    pub fn offset(self, n: usize) -> Self {
        Self(self.0 + n)
    }
}

impl core::ops::Add<Arity> for Address {
    type Output = Self;

    fn add(self, rhs: Arity) -> Self {
        self.offset(rhs.index())
    }
}

/// A register in the register zone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IndexNewType)]
#[display("X{}")]
pub struct Xn {
    pub xn: u16,
}

/// An interned functor id. Dense, assigned in first-seen order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IndexNewType)]
pub struct Functor(pub u16);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IndexNewType)]
#[display("{}")]
pub struct Arity(pub u8);

impl Arity {
    pub const ZERO: Self = Self(0);
}
