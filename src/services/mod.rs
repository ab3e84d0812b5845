pub mod cleanup_service;
pub mod executor;
pub mod fetcher;
pub mod retention;
pub mod retry;

pub use cleanup_service::CleanupService;
