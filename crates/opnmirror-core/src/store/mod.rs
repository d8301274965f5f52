// ── Mirror storage ──

pub mod collection;
pub mod entity;
pub mod mirror_store;
pub mod snapshot;

pub use collection::{ChangeCounts, Collection, Reconciled, UpsertOutcome};
pub use entity::MirrorEntity;
pub use mirror_store::MirrorStore;
pub use snapshot::{MirrorSnapshot, ServerSnapshot, StoreSnapshot};
