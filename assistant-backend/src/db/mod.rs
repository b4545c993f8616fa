pub mod session_locks;
pub mod sqlite;
pub mod tables;

pub use session_locks::SessionLocks;
pub use sqlite::Database;
