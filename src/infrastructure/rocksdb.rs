use crate::domain::batch::{WriteBatch, WriteOp};
use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::ports::{BatchWriter, CourseStore, EnrollmentStore, StoreResult, StudentStore};
use crate::domain::student::{Student, StudentId};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for student records.
pub const CF_STUDENTS: &str = "students";
/// Column Family for course records.
pub const CF_COURSES: &str = "courses";
/// Column Family for enrollments, keyed by student id then course id.
pub const CF_ENROLLMENTS: &str = "enrollments";

/// A persistent repository backed by RocksDB.
///
/// Each entity type lives in its own Column Family. Batches are translated
/// into a single `rocksdb::WriteBatch`, which RocksDB applies atomically.
/// Validation reads and the write happen under `commit_lock` so that version
/// checks cannot interleave within one process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

fn enrollment_key(student: StudentId, course: CourseId) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&student.to_be_bytes());
    key[4..].copy_from_slice(&course.to_be_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_STUDENTS, CF_COURSES, CF_ENROLLMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> StoreResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("{} column family not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> StoreResult<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> StoreResult<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str, mode: IteratorMode) -> StoreResult<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    /// Reads a student, preferring a version staged earlier in the same batch.
    fn load_student(
        &self,
        staged: &HashMap<StudentId, Student>,
        id: StudentId,
    ) -> StoreResult<Option<Student>> {
        match staged.get(&id) {
            Some(student) => Ok(Some(student.clone())),
            None => self.read(CF_STUDENTS, &id.to_be_bytes()),
        }
    }

    fn load_course(
        &self,
        staged: &HashMap<CourseId, Course>,
        id: CourseId,
    ) -> StoreResult<Option<Course>> {
        match staged.get(&id) {
            Some(course) => Ok(Some(course.clone())),
            None => self.read(CF_COURSES, &id.to_be_bytes()),
        }
    }
}

#[async_trait]
impl StudentStore for RocksDBStore {
    async fn store_student(&self, student: Student) -> StoreResult<()> {
        let _guard = self.commit_lock.lock().await;
        let key = student.id.to_be_bytes();
        if self.read::<Student>(CF_STUDENTS, &key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "student {} already exists",
                student.id
            )));
        }
        self.write(CF_STUDENTS, &key, &student)
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        self.read(CF_STUDENTS, &id.to_be_bytes())
    }

    async fn all_students(&self) -> StoreResult<Vec<Student>> {
        self.scan(CF_STUDENTS, IteratorMode::Start)
    }
}

#[async_trait]
impl CourseStore for RocksDBStore {
    async fn store_course(&self, course: Course) -> StoreResult<()> {
        let _guard = self.commit_lock.lock().await;
        let key = course.id.to_be_bytes();
        if self.read::<Course>(CF_COURSES, &key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "course {} already exists",
                course.id
            )));
        }
        self.write(CF_COURSES, &key, &course)
    }

    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        self.read(CF_COURSES, &id.to_be_bytes())
    }

    async fn all_courses(&self) -> StoreResult<Vec<Course>> {
        self.scan(CF_COURSES, IteratorMode::Start)
    }
}

#[async_trait]
impl EnrollmentStore for RocksDBStore {
    async fn enrollments_for_student(&self, student: StudentId) -> StoreResult<Vec<Enrollment>> {
        let prefix = student.to_be_bytes();
        let cf = self.cf(CF_ENROLLMENTS)?;
        let mut enrollments = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix[..], Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            enrollments.push(serde_json::from_slice(&value)?);
        }
        Ok(enrollments)
    }

    async fn all_enrollments(&self) -> StoreResult<Vec<Enrollment>> {
        self.scan(CF_ENROLLMENTS, IteratorMode::Start)
    }
}

#[async_trait]
impl BatchWriter for RocksDBStore {
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let _guard = self.commit_lock.lock().await;

        let mut students: HashMap<StudentId, Student> = HashMap::new();
        let mut courses: HashMap<CourseId, Course> = HashMap::new();
        let mut enrollments: Vec<Enrollment> = Vec::new();
        let mut pairs: HashSet<(StudentId, CourseId)> = HashSet::new();

        for op in batch {
            match op {
                WriteOp::UpdateStudent(student) => {
                    let current = self.load_student(&students, student.id)?.ok_or_else(|| {
                        StoreError::MissingRecord(format!("student {}", student.id))
                    })?;
                    if current.version != student.version {
                        return Err(StoreError::Conflict(format!(
                            "student {} is at version {}, write was based on {}",
                            student.id, current.version, student.version
                        )));
                    }
                    let mut next = student;
                    next.version += 1;
                    students.insert(next.id, next);
                }
                WriteOp::InsertEnrollment(enrollment) => {
                    if self.load_student(&students, enrollment.student)?.is_none() {
                        return Err(StoreError::MissingRecord(format!(
                            "student {}",
                            enrollment.student
                        )));
                    }
                    if self.load_course(&courses, enrollment.course)?.is_none() {
                        return Err(StoreError::MissingRecord(format!(
                            "course {}",
                            enrollment.course
                        )));
                    }
                    let key = enrollment_key(enrollment.student, enrollment.course);
                    let cf = self.cf(CF_ENROLLMENTS)?;
                    let pair = (enrollment.student, enrollment.course);
                    if self.db.get_pinned_cf(cf, key)?.is_some() || !pairs.insert(pair) {
                        return Err(StoreError::Conflict(format!(
                            "student {} is already enrolled in course {}",
                            pair.0, pair.1
                        )));
                    }
                    enrollments.push(enrollment);
                }
                WriteOp::ActivateCourse(id) => {
                    let mut course = self
                        .load_course(&courses, id)?
                        .ok_or_else(|| StoreError::MissingRecord(format!("course {}", id)))?;
                    if !course.active {
                        course.activate();
                        courses.insert(id, course);
                    }
                }
            }
        }

        let mut write = rocksdb::WriteBatch::default();
        let cf_students = self.cf(CF_STUDENTS)?;
        for (id, student) in &students {
            write.put_cf(cf_students, id.to_be_bytes(), serde_json::to_vec(student)?);
        }
        let cf_courses = self.cf(CF_COURSES)?;
        for (id, course) in &courses {
            write.put_cf(cf_courses, id.to_be_bytes(), serde_json::to_vec(course)?);
        }
        let cf_enrollments = self.cf(CF_ENROLLMENTS)?;
        for enrollment in &enrollments {
            write.put_cf(
                cf_enrollments,
                enrollment_key(enrollment.student, enrollment.course),
                serde_json::to_vec(enrollment)?,
            );
        }
        let ops = write.len();
        self.db.write(write)?;
        tracing::debug!(ops, "committed batch to rocksdb");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::student::Balance;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_STUDENTS).is_some());
        assert!(store.db.cf_handle(CF_COURSES).is_some());
        assert!(store.db.cf_handle(CF_ENROLLMENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_student_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let student = Student::new(1, "Gertrude", Balance::new(100));
        store.store_student(student.clone()).await.unwrap();

        let retrieved = store.get_student(1).await.unwrap().unwrap();
        assert_eq!(retrieved, student);

        let all = store.all_students().await.unwrap();
        assert_eq!(all, vec![student]);

        assert!(store.get_student(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_batch_commit() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        store
            .store_student(Student::new(1, "Gertrude", Balance::new(10)))
            .await
            .unwrap();
        store.store_course(Course::new(5, "Science")).await.unwrap();
        store.store_course(Course::new(6, "Math")).await.unwrap();

        let mut student = store.get_student(1).await.unwrap().unwrap();
        student.balance = Balance::new(3);
        let mut batch = WriteBatch::new();
        batch
            .update_student(student)
            .insert_enrollment(Enrollment::new(1, 5))
            .activate_course(5);
        store.commit(batch).await.unwrap();

        let stored = store.get_student(1).await.unwrap().unwrap();
        assert_eq!(stored.balance, Balance::new(3));
        assert_eq!(stored.version, 1);
        assert!(store.get_course(5).await.unwrap().unwrap().active);
        assert!(!store.get_course(6).await.unwrap().unwrap().active);
        assert_eq!(store.enrollments_for_student(1).await.unwrap().len(), 1);
        assert!(store.enrollments_for_student(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rocksdb_rejected_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        store
            .store_student(Student::new(1, "Gertrude", Balance::new(10)))
            .await
            .unwrap();
        store.store_course(Course::new(5, "Science")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .insert_enrollment(Enrollment::new(1, 5))
            .activate_course(5)
            .insert_enrollment(Enrollment::new(1, 404));
        assert!(matches!(
            store.commit(batch).await,
            Err(StoreError::MissingRecord(_))
        ));

        assert!(store.all_enrollments().await.unwrap().is_empty());
        assert!(!store.get_course(5).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_rocksdb_existing_ids_are_not_overwritten() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let original = Student::new(1, "Gertrude", Balance::new(10));
        store.store_student(original.clone()).await.unwrap();
        store.store_course(Course::new(5, "Science")).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.activate_course(5);
        store.commit(batch).await.unwrap();

        let result = store
            .store_student(Student::new(1, "Gertrude", Balance::new(10)))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        let result = store.store_course(Course::new(5, "Science")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let stored = store.get_student(1).await.unwrap().unwrap();
        assert_eq!(stored.registration_code, original.registration_code);
        assert!(store.get_course(5).await.unwrap().unwrap().active);
    }
}
