pub mod chat;
pub mod conversations;
pub mod documents;
pub mod health;
pub mod multipart;
pub mod notes;
pub mod transcribe;
pub mod voice;
