// State management and checkpoint tracking

pub mod checkpoint;
pub mod manager;
pub mod storage;

pub use checkpoint::{epoch, Checkpoint, CheckpointStatus};
pub use manager::StateManager;
pub use storage::{CheckpointStore, FileCheckpointStore, StoreValidation};
