//! Reference storage implementations

pub mod fs_attachments;
pub mod in_memory;

pub use fs_attachments::FsAttachmentStore;
pub use in_memory::InMemoryRecordStore;
