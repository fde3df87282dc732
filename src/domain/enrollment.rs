use super::course::CourseId;
use super::student::StudentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EnrollmentId = Uuid;

/// Score every enrollment starts with.
pub const INITIAL_SCORE: u32 = 100;

/// Links a student to a course.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: StudentId,
    pub course: CourseId,
    pub score: u32,
}

impl Enrollment {
    pub fn new(student: StudentId, course: CourseId) -> Self {
        Self {
            id: Uuid::new_v4(),
            student,
            course,
            score: INITIAL_SCORE,
        }
    }
}
