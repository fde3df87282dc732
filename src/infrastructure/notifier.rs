use crate::domain::ports::Notifier;
use crate::domain::student::StudentId;
use crate::error::NotifyError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Emits enrollment confirmations as log events.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_enrollment_confirmed(&self, student: StudentId) -> Result<(), NotifyError> {
        tracing::info!(student, "enrollment confirmation sent");
        Ok(())
    }
}

/// Collects confirmed student ids in memory, in delivery order.
#[derive(Debug, Default, Clone)]
pub struct OutboxNotifier {
    sent: Arc<Mutex<Vec<StudentId>>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<StudentId> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify_enrollment_confirmed(&self, student: StudentId) -> Result<(), NotifyError> {
        self.sent.lock().await.push(student);
        Ok(())
    }
}
