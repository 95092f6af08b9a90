pub mod types;
pub mod text;
pub mod config;
pub mod fetcher;
pub mod dedup;
pub mod editor;
pub mod store;
pub mod coordinator;
pub mod scheduler;

pub use types::*;
pub use config::AppConfig;
pub use fetcher::FeedFetcher;
pub use dedup::dedupe;
pub use editor::{ContentEditor, GenerationBackend, TogetherBackend};
pub use store::CategoryStore;
pub use coordinator::IngestionCoordinator;
pub use scheduler::Scheduler;
