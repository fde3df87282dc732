use super::batch::WriteBatch;
use super::course::{Course, CourseId};
use super::enrollment::Enrollment;
use super::student::{Student, StudentId};
use crate::error::{NotifyError, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Inserts a new student. An existing id is a [`StoreError::Conflict`]:
    /// the stored registration code and version are never replaced here.
    /// Service writes go through [`BatchWriter::commit`].
    async fn store_student(&self, student: Student) -> StoreResult<()>;
    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>>;
    async fn all_students(&self) -> StoreResult<Vec<Student>>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Inserts a new course. An existing id is a [`StoreError::Conflict`].
    async fn store_course(&self, course: Course) -> StoreResult<()>;
    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>>;
    async fn all_courses(&self) -> StoreResult<Vec<Course>>;

    async fn active_courses(&self) -> StoreResult<Vec<Course>> {
        Ok(self
            .all_courses()
            .await?
            .into_iter()
            .filter(|c| c.active)
            .collect())
    }

    async fn courses_created_before(&self, ts: DateTime<Utc>) -> StoreResult<Vec<Course>> {
        Ok(self
            .all_courses()
            .await?
            .into_iter()
            .filter(|c| c.created_at < ts)
            .collect())
    }
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn enrollments_for_student(&self, student: StudentId) -> StoreResult<Vec<Enrollment>>;
    async fn all_enrollments(&self) -> StoreResult<Vec<Enrollment>>;
}

/// Atomic multi-record writes.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Applies every op in `batch` or none of them.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Everything the services need from persistence.
pub trait Repository: StudentStore + CourseStore + EnrollmentStore + BatchWriter {}

impl<T> Repository for T where T: StudentStore + CourseStore + EnrollmentStore + BatchWriter {}

pub type RepositoryRef = Arc<dyn Repository>;

/// Delivers enrollment confirmations. Best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_enrollment_confirmed(&self, student: StudentId) -> Result<(), NotifyError>;
}

pub type NotifierRef = Arc<dyn Notifier>;
