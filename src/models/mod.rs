pub mod entry;
pub mod message;
pub mod task;
