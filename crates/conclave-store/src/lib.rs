pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::StoreError;
pub use manager::MessageStore;
pub use types::{FileAttachment, HistoryPage, Message, SearchHit, SearchPage};
