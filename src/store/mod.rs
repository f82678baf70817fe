//! Persistence layer — session storage behind an async trait.

pub mod file;
pub mod traits;

pub use file::FileSessionStore;
pub use traits::SessionStore;
