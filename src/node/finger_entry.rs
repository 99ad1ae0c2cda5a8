use std::fmt;

use crate::identifier::Identifier;

pub type Address = String;

/// An entry in the finger table, or the value held by the predecessor
/// pointer: an address plus the identifier it hashes to.
#[derive(Clone, PartialEq, Eq)]
pub struct FingerEntry {
    pub id: Identifier,
    pub address: Address,
}

impl fmt::Debug for FingerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerEntry")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}

impl FingerEntry {
    pub fn new(address: Address) -> Self {
        FingerEntry {
            id: Identifier::of(&address),
            address,
        }
    }
}

impl From<Address> for FingerEntry {
    fn from(address: Address) -> Self {
        FingerEntry::new(address)
    }
}
