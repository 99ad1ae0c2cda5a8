pub mod finger_entry;
pub mod finger_table;
pub mod successor_list;

pub use finger_entry::{Address, FingerEntry};
pub use finger_table::FingerTable;
pub use successor_list::SuccessorList;
