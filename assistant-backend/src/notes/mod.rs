//! Notes: plain text files under the notes directory, indexed by the
//! `notes` table.

pub mod file_ops;
pub mod store;

pub use store::{EditMode, EditOutcome, NoteStore};
