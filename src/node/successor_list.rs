use crate::node::finger_entry::Address;

/// The distinguished "no peer" address. Never pingable, never equal to a
/// real address.
pub const NIL: &str = "";

/// Ordered list of `L` successive successors. `[0]` is the current best
/// successor; slots compact from the left as dead entries are dropped.
#[derive(Debug, Clone)]
pub struct SuccessorList {
    entries: Vec<Address>,
}

impl SuccessorList {
    pub fn new(len: usize, head: Address) -> Self {
        let mut entries = vec![NIL.to_string(); len];
        entries[0] = head;
        SuccessorList { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|a| a == NIL)
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.entries
    }

    pub fn head(&self) -> &Address {
        &self.entries[0]
    }

    pub fn set_head(&mut self, address: Address) {
        self.entries[0] = address;
    }

    /// Left-shifts by `amount` positions, e.g. after discovering the
    /// live head sits at index `amount`; trailing slots become NIL.
    pub fn shift_left(&mut self, amount: usize) {
        if amount == 0 {
            return;
        }
        let len = self.entries.len();
        for i in 0..len {
            self.entries[i] = if i + amount < len {
                self.entries[i + amount].clone()
            } else {
                NIL.to_string()
            };
        }
    }

    /// Rebuilds the list with `new_head` at slot 0, followed by
    /// `candidates` in order, deduped and truncated to this list's
    /// length. This only drops `NIL`/duplicate slots; callers are
    /// responsible for pinging and dropping genuinely dead peers from
    /// `candidates` first (see `transport::filter_live`).
    pub fn rebuild(&mut self, new_head: Address, candidates: Vec<Address>) {
        let len = self.entries.len();
        let mut rebuilt = Vec::with_capacity(len);
        rebuilt.push(new_head);
        for candidate in candidates {
            if rebuilt.len() >= len {
                break;
            }
            if candidate != NIL && !rebuilt.contains(&candidate) {
                rebuilt.push(candidate);
            }
        }
        rebuilt.resize(len, NIL.to_string());
        self.entries = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_left_pads_trailing_nil() {
        let mut list = SuccessorList::new(4, "a".into());
        list.entries = vec!["a".into(), "b".into(), "c".into(), NIL.into()];
        list.shift_left(2);
        assert_eq!(list.as_slice(), &["c".to_string(), NIL.to_string(), NIL.to_string(), NIL.to_string()]);
    }

    #[test]
    fn rebuild_compacts_and_dedups() {
        let mut list = SuccessorList::new(3, "self".into());
        list.rebuild(
            "s1".into(),
            vec!["s1".into(), NIL.into(), "s2".into(), "s3".into()],
        );
        assert_eq!(list.as_slice(), &["s1".to_string(), "s2".to_string(), "s3".to_string()]);
    }
}
