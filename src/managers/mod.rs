pub mod accounting;
pub mod backup;
pub mod context;
pub mod discovery;
pub mod logging;
pub mod notification;
pub mod uploader;
