use crate::identifier::M;
use crate::node::finger_entry::{Address, FingerEntry};

/// Routing shortcuts: `fingers[i]` is believed to be the node that
/// succeeds `start(self_id, i)`. Fixed length M, one entry per bit
/// position.
#[derive(Debug, Clone)]
pub struct FingerTable {
    pub fingers: Vec<FingerEntry>,
}

impl FingerTable {
    /// Every finger points at `address` initially (used by `create()`
    /// and as the seed before `join()` resolves real fingers).
    pub fn new(address: &Address) -> Self {
        let entry = FingerEntry::new(address.clone());
        FingerTable {
            fingers: vec![entry; M as usize],
        }
    }

    pub fn set(&mut self, index: usize, address: Address) {
        self.fingers[index] = FingerEntry::new(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_points_every_finger_at_self() {
        let table = FingerTable::new(&"127.0.0.1:1".to_string());
        assert_eq!(table.fingers.len(), M as usize);
        assert!(table.fingers.iter().all(|f| f.address == "127.0.0.1:1"));
    }
}
