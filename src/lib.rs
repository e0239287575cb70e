//! Core library for PDA Assist.
//! Keeps an in-memory mirror of the preset distribution config held by the game-side
//! backend, edits it with staged deletions and shape-checked manual edits, maintains the
//! favorites overlay, and polls the backend for drift and liveness.

pub mod config;
pub mod detector;
pub mod document;
pub mod editor;
mod error;
pub mod favorites;
pub mod gateway;
pub mod notice;
pub mod session;
pub mod statics;
mod value;

pub use config::AssistConfig;
pub use document::{Address, DocumentStore, PendingDeletion, SectionView, Selection};
pub use editor::ManualEditValidator;
pub use error::{AssistError, Result};
pub use gateway::{HttpGateway, MemoryGateway, PersistenceGateway};
pub use notice::{Notice, NoticeKind, NoticeLevel};
pub use session::{Session, SessionEvent, SessionEvents};
pub use value::{ConfigValue, Number, SectionShape, ShapeClass};
