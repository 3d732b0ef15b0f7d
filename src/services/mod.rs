pub mod pass;

use crate::error::ServiceError;
use crate::models::entry::{EntryDetail, EntrySummary};

pub use pass::PassCommand;

pub trait PasswordService: Send + Sync {
    fn is_initialized(&self) -> bool;
    fn get_all_entries(&self) -> Result<Vec<EntrySummary>, ServiceError>;
    fn search_entries(&self, query: &str) -> Result<Vec<EntrySummary>, ServiceError>;
    fn get_entry_details(&self, path: &str) -> Result<EntryDetail, ServiceError>;
    fn create_entry(&self, path: &str, content: &str) -> Result<String, ServiceError>;
    fn update_entry(&self, path: &str, content: &str) -> Result<String, ServiceError>;
    fn sync_pull(&self) -> Result<String, ServiceError>;
    fn sync_push(&self) -> Result<String, ServiceError>;
}

pub trait NotificationSink: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_success(&self, message: &str);
    fn show_error(&self, message: &str);
}
