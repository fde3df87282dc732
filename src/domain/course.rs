use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CourseId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Course {
    pub id: CourseId,
    pub subject: String,
    /// Set once a student enrolls; never cleared.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Creates an inactive course stamped with the current time.
    pub fn new(id: CourseId, subject: impl Into<String>) -> Self {
        Self::created_at(id, subject, Utc::now())
    }

    pub fn created_at(id: CourseId, subject: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            subject: subject.into(),
            active: false,
            created_at,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }
}
