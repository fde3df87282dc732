use super::course::CourseId;
use super::enrollment::Enrollment;
use super::student::Student;

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace a student. `student.version` must match the stored version.
    UpdateStudent(Student),
    /// Insert a new enrollment. Rejected if the pair already exists or either
    /// side is missing.
    InsertEnrollment(Enrollment),
    /// Mark a course active. A no-op for an already active course.
    ActivateCourse(CourseId),
}

/// An ordered set of writes that a store applies all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_student(&mut self, student: Student) -> &mut Self {
        self.ops.push(WriteOp::UpdateStudent(student));
        self
    }

    pub fn insert_enrollment(&mut self, enrollment: Enrollment) -> &mut Self {
        self.ops.push(WriteOp::InsertEnrollment(enrollment));
        self
    }

    pub fn activate_course(&mut self, course: CourseId) -> &mut Self {
        self.ops.push(WriteOp::ActivateCourse(course));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
