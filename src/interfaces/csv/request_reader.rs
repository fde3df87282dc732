use crate::domain::course::CourseId;
use crate::domain::student::StudentId;
use crate::error::{RegistrarError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Transfer,
    Enroll,
}

/// A raw request row as it appears in the file.
#[derive(Debug, Deserialize)]
struct RequestRecord {
    r#type: RequestType,
    student: StudentId,
    to: Option<StudentId>,
    amount: Option<i64>,
    courses: Option<String>,
}

/// A request routed to one of the services.
#[derive(Debug, PartialEq, Clone)]
pub enum Request {
    Transfer {
        from: StudentId,
        to: StudentId,
        amount: i64,
    },
    Enroll {
        student: StudentId,
        courses: Vec<CourseId>,
    },
}

impl TryFrom<RequestRecord> for Request {
    type Error = RegistrarError;

    fn try_from(record: RequestRecord) -> Result<Self> {
        match record.r#type {
            RequestType::Transfer => {
                let to = record.to.ok_or_else(|| {
                    RegistrarError::ValidationError("transfer requires a 'to' student".into())
                })?;
                let amount = record.amount.ok_or_else(|| {
                    RegistrarError::ValidationError("transfer requires an amount".into())
                })?;
                Ok(Request::Transfer {
                    from: record.student,
                    to,
                    amount,
                })
            }
            RequestType::Enroll => {
                let courses = parse_course_list(record.courses.as_deref().unwrap_or(""))?;
                Ok(Request::Enroll {
                    student: record.student,
                    courses,
                })
            }
        }
    }
}

/// Parses a `;`-separated list of course ids. Blank entries are ignored.
pub fn parse_course_list(raw: &str) -> Result<Vec<CourseId>> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<CourseId>().map_err(|_| {
                RegistrarError::ValidationError(format!("invalid course id: {:?}", s))
            })
        })
        .collect()
}

/// Reads service requests from a CSV source.
///
/// Columns are `type, student, to, amount, courses`. Whitespace is trimmed and
/// short rows are accepted, so an enroll row can leave `to` and `amount` blank.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates requests, one result per row.
    pub fn requests(self) -> impl Iterator<Item = Result<Request>> {
        self.reader.into_deserialize().map(|result| {
            let record: RequestRecord = result?;
            Request::try_from(record)
        })
    }
}
