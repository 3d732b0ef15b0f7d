use super::entry::{EntryDetail, EntrySummary};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Entries(Vec<EntrySummary>),
    Entry(EntryDetail),
    Message(String),
}

impl From<Vec<EntrySummary>> for TaskOutput {
    fn from(entries: Vec<EntrySummary>) -> Self {
        TaskOutput::Entries(entries)
    }
}

impl From<EntryDetail> for TaskOutput {
    fn from(entry: EntryDetail) -> Self {
        TaskOutput::Entry(entry)
    }
}

impl From<String> for TaskOutput {
    fn from(message: String) -> Self {
        TaskOutput::Message(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Progress { fraction: f64, status: String },
    Completed { success: bool, result: Option<TaskOutput> },
    Failed { error: String },
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Progress { .. })
    }
}
