pub mod archiver;
pub mod command;
pub mod drive;
pub mod google_auth;
pub mod locker;
pub mod mailer;

// Trait-based abstractions for testability
pub mod executor;
pub mod storage_ops;

// Re-export commonly used types and traits (used by test crate)
pub use archiver::{Compressor, ExternalArchiver, ZipArchiver};
pub use executor::{CommandExecutor, RealExecutor};
pub use mailer::{Mailer, SmtpMailer};
pub use storage_ops::{RemoteStorage, StorageError};
