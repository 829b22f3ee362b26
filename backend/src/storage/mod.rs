pub mod upload_store;

pub use upload_store::{StorageError, StoredImage, UploadStore, sanitize_filename};
