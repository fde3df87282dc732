#![allow(dead_code)]

use async_trait::async_trait;
use registrar::domain::batch::WriteBatch;
use registrar::domain::course::{Course, CourseId};
use registrar::domain::enrollment::Enrollment;
use registrar::domain::ports::{
    BatchWriter, CourseStore, EnrollmentStore, Notifier, StoreResult, StudentStore,
};
use registrar::domain::student::{Balance, Student, StudentId};
use registrar::error::{NotifyError, StoreError};
use registrar::infrastructure::in_memory::InMemoryRepository;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

pub async fn seed_students(repo: &InMemoryRepository, students: &[(StudentId, &str, u64)]) {
    for &(id, name, balance) in students {
        repo.store_student(Student::new(id, name, Balance::new(balance)))
            .await
            .unwrap();
    }
}

pub async fn seed_courses(repo: &InMemoryRepository, courses: &[(CourseId, &str)]) {
    for &(id, subject) in courses {
        repo.store_course(Course::new(id, subject)).await.unwrap();
    }
}

/// Reads from an in-memory repository but fails every commit, recording the
/// batches it was handed. Fails with a backend error, or with a write
/// conflict when built with [`FailingCommitRepository::conflicting`].
#[derive(Clone, Default)]
pub struct FailingCommitRepository {
    pub inner: InMemoryRepository,
    pub attempts: Arc<AtomicUsize>,
    pub batches: Arc<std::sync::Mutex<Vec<WriteBatch>>>,
    conflict: bool,
}

impl FailingCommitRepository {
    pub fn wrap(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn conflicting(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            conflict: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StudentStore for FailingCommitRepository {
    async fn store_student(&self, student: Student) -> StoreResult<()> {
        self.inner.store_student(student).await
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        self.inner.get_student(id).await
    }

    async fn all_students(&self) -> StoreResult<Vec<Student>> {
        self.inner.all_students().await
    }
}

#[async_trait]
impl CourseStore for FailingCommitRepository {
    async fn store_course(&self, course: Course) -> StoreResult<()> {
        self.inner.store_course(course).await
    }

    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        self.inner.get_course(id).await
    }

    async fn all_courses(&self) -> StoreResult<Vec<Course>> {
        self.inner.all_courses().await
    }
}

#[async_trait]
impl EnrollmentStore for FailingCommitRepository {
    async fn enrollments_for_student(&self, student: StudentId) -> StoreResult<Vec<Enrollment>> {
        self.inner.enrollments_for_student(student).await
    }

    async fn all_enrollments(&self) -> StoreResult<Vec<Enrollment>> {
        self.inner.all_enrollments().await
    }
}

#[async_trait]
impl BatchWriter for FailingCommitRepository {
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch);
        if self.conflict {
            Err(StoreError::Conflict("record changed concurrently".to_string()))
        } else {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }
}

/// A notifier whose delivery always fails.
pub struct BrokenNotifier {
    pub calls: AtomicUsize,
}

impl BrokenNotifier {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn notify_enrollment_confirmed(&self, _student: StudentId) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Delivery("smtp unreachable".to_string()))
    }
}
