pub mod capability;
pub mod dispatcher;
mod error;
pub mod fetcher;
mod local;
pub mod mock;
pub mod queue;
pub mod storage;
pub mod worker;

pub use capability::{Capabilities, CapabilityRegistry, JobBackendSlot};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::ClipError;
pub use fetcher::{HttpMetadataFetcher, MetadataFetcher};
pub use local::ClipService;
pub use queue::{DbJobQueue, JobBackend};
pub use storage::{AttachmentStorage, MirroredStorage, RemoteOnly};
pub use worker::Worker;
