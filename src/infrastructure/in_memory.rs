use crate::domain::batch::{WriteBatch, WriteOp};
use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::ports::{BatchWriter, CourseStore, EnrollmentStore, StoreResult, StudentStore};
use crate::domain::student::{Student, StudentId};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    students: HashMap<StudentId, Student>,
    courses: HashMap<CourseId, Course>,
    enrollments: Vec<Enrollment>,
    pairs: HashSet<(StudentId, CourseId)>,
}

/// Writes validated against `State` but not yet applied.
#[derive(Default)]
struct Staged {
    students: HashMap<StudentId, Student>,
    courses: HashMap<CourseId, Course>,
    enrollments: Vec<Enrollment>,
    pairs: HashSet<(StudentId, CourseId)>,
}

impl Staged {
    fn student<'a>(&'a self, state: &'a State, id: StudentId) -> Option<&'a Student> {
        self.students.get(&id).or_else(|| state.students.get(&id))
    }

    fn course<'a>(&'a self, state: &'a State, id: CourseId) -> Option<&'a Course> {
        self.courses.get(&id).or_else(|| state.courses.get(&id))
    }

    fn stage(&mut self, state: &State, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::UpdateStudent(student) => {
                let current = self.student(state, student.id).ok_or_else(|| {
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
                self.students.insert(next.id, next);
            }
            WriteOp::InsertEnrollment(enrollment) => {
                if self.student(state, enrollment.student).is_none() {
                    return Err(StoreError::MissingRecord(format!(
                        "student {}",
                        enrollment.student
                    )));
                }
                if self.course(state, enrollment.course).is_none() {
                    return Err(StoreError::MissingRecord(format!(
                        "course {}",
                        enrollment.course
                    )));
                }
                let pair = (enrollment.student, enrollment.course);
                if state.pairs.contains(&pair) || !self.pairs.insert(pair) {
                    return Err(StoreError::Conflict(format!(
                        "student {} is already enrolled in course {}",
                        pair.0, pair.1
                    )));
                }
                self.enrollments.push(enrollment);
            }
            WriteOp::ActivateCourse(id) => {
                let course = self
                    .course(state, id)
                    .ok_or_else(|| StoreError::MissingRecord(format!("course {}", id)))?;
                if !course.active {
                    let mut course = course.clone();
                    course.activate();
                    self.courses.insert(id, course);
                }
            }
        }
        Ok(())
    }

    fn apply(self, state: &mut State) {
        state.students.extend(self.students);
        state.courses.extend(self.courses);
        state.enrollments.extend(self.enrollments);
        state.pairs.extend(self.pairs);
    }
}

/// A thread-safe in-memory repository for students, courses and enrollments.
///
/// All records live behind a single `Arc<RwLock<..>>`; a batch is validated and
/// applied while holding the write lock, so readers never observe half of it.
#[derive(Default, Clone)]
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentStore for InMemoryRepository {
    async fn store_student(&self, student: Student) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.students.contains_key(&student.id) {
            return Err(StoreError::Conflict(format!(
                "student {} already exists",
                student.id
            )));
        }
        state.students.insert(student.id, student);
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.students.get(&id).cloned())
    }

    async fn all_students(&self) -> StoreResult<Vec<Student>> {
        let state = self.state.read().await;
        let mut students: Vec<Student> = state.students.values().cloned().collect();
        students.sort_by_key(|s| s.id);
        Ok(students)
    }
}

#[async_trait]
impl CourseStore for InMemoryRepository {
    async fn store_course(&self, course: Course) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.courses.contains_key(&course.id) {
            return Err(StoreError::Conflict(format!(
                "course {} already exists",
                course.id
            )));
        }
        state.courses.insert(course.id, course);
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.get(&id).cloned())
    }

    async fn all_courses(&self) -> StoreResult<Vec<Course>> {
        let state = self.state.read().await;
        let mut courses: Vec<Course> = state.courses.values().cloned().collect();
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryRepository {
    async fn enrollments_for_student(&self, student: StudentId) -> StoreResult<Vec<Enrollment>> {
        let state = self.state.read().await;
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.student == student)
            .cloned()
            .collect())
    }

    async fn all_enrollments(&self) -> StoreResult<Vec<Enrollment>> {
        let state = self.state.read().await;
        Ok(state.enrollments.clone())
    }
}

#[async_trait]
impl BatchWriter for InMemoryRepository {
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.len();
        let mut state = self.state.write().await;
        let mut staged = Staged::default();
        for op in batch {
            staged.stage(&state, op)?;
        }
        staged.apply(&mut state);
        tracing::debug!(ops, "committed batch");
        Ok(())
    }
}
