pub mod blob;
pub mod memory;
pub mod rest;
pub mod store;
pub mod types;

pub use blob::{BlobError, BlobStore, FilesystemBlobStore, MemoryBlobStore};
pub use memory::MemoryRecordStore;
pub use rest::RestRecordStore;
pub use store::{RecordKey, RecordStore, StoreError};
pub use types::{
    Detail, DetailId, DetailKind, FieldValue, FileAttachment, Record, Value, ValueError,
    new_detail_id,
};
