use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::student::{Balance, RegistrationCode, Student, StudentId};
use crate::error::{RegistrarError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

#[derive(Debug, Serialize, Deserialize)]
struct StudentRecord {
    id: StudentId,
    name: String,
    balance: u64,
    #[serde(default)]
    registration_code: Option<String>,
}

impl TryFrom<StudentRecord> for Student {
    type Error = RegistrarError;

    fn try_from(record: StudentRecord) -> Result<Self> {
        let balance = Balance::new(record.balance);
        match record.registration_code {
            Some(code) => Ok(Student::with_code(
                record.id,
                record.name,
                balance,
                RegistrationCode::try_from(code)?,
            )),
            None => Ok(Student::new(record.id, record.name, balance)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CourseRecord {
    id: CourseId,
    subject: String,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<CourseRecord> for Course {
    fn from(record: CourseRecord) -> Self {
        let mut course = match record.created_at {
            Some(ts) => Course::created_at(record.id, record.subject, ts),
            None => Course::new(record.id, record.subject),
        };
        if record.active.unwrap_or(false) {
            course.activate();
        }
        course
    }
}

#[derive(Debug, Serialize)]
struct EnrollmentRecord<'a> {
    student: StudentId,
    course: CourseId,
    subject: &'a str,
    score: u32,
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Reads `id, name, balance[, registration_code]` rows. Students without a
/// code get a freshly generated one.
pub fn read_students<R: Read>(source: R) -> Result<Vec<Student>> {
    csv_reader(source)
        .into_deserialize::<StudentRecord>()
        .map(|row| -> Result<Student> { Student::try_from(row?) })
        .collect()
}

/// Reads `id, subject[, active][, created_at]` rows.
pub fn read_courses<R: Read>(source: R) -> Result<Vec<Course>> {
    csv_reader(source)
        .into_deserialize::<CourseRecord>()
        .map(|row| -> Result<Course> { Ok(Course::from(row?)) })
        .collect()
}

/// Writes roster CSV to any `Write` sink.
pub struct RosterWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RosterWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_students<'a, I>(&mut self, students: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Student>,
    {
        for student in students {
            self.writer.serialize(StudentRecord {
                id: student.id,
                name: student.name.clone(),
                balance: student.balance.value(),
                registration_code: Some(student.registration_code.to_string()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_courses<'a, I>(&mut self, courses: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Course>,
    {
        for course in courses {
            self.writer.serialize(CourseRecord {
                id: course.id,
                subject: course.subject.clone(),
                active: Some(course.active),
                created_at: Some(course.created_at),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes `student, course, subject, score` rows. Enrollments whose course
    /// is not in `courses` get an empty subject.
    pub fn write_enrollments<'a, I>(
        &mut self,
        enrollments: I,
        courses: &HashMap<CourseId, Course>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = &'a Enrollment>,
    {
        for enrollment in enrollments {
            let subject = courses
                .get(&enrollment.course)
                .map(|c| c.subject.as_str())
                .unwrap_or("");
            self.writer.serialize(EnrollmentRecord {
                student: enrollment.student,
                course: enrollment.course,
                subject,
                score: enrollment.score,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| RegistrarError::IoError(e.into_error()))
    }
}
