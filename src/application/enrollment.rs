use crate::domain::batch::WriteBatch;
use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::Enrollment;
use crate::domain::ports::{NotifierRef, RepositoryRef};
use crate::domain::student::{Student, StudentId};
use crate::error::{EnrollmentError, ErrorKind, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Progress of a single enroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStage {
    Pending,
    Validated,
    Persisted,
    Activated,
    Notified,
    /// Terminal. The returned [`EnrollmentError`] carries the full reason.
    Failed(ErrorKind),
}

impl EnrollmentStage {
    pub fn failed(err: &EnrollmentError) -> Self {
        EnrollmentStage::Failed(err.kind())
    }
}

impl fmt::Display for EnrollmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStage::Pending => f.write_str("pending"),
            EnrollmentStage::Validated => f.write_str("validated"),
            EnrollmentStage::Persisted => f.write_str("persisted"),
            EnrollmentStage::Activated => f.write_str("activated"),
            EnrollmentStage::Notified => f.write_str("notified"),
            EnrollmentStage::Failed(kind) => write!(f, "failed ({:?})", kind),
        }
    }
}

/// What happened to the confirmation after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    /// Nothing new was enrolled, so nothing was confirmed.
    Skipped,
    /// Delivery failed. The enrollment itself stands.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    pub student: StudentId,
    /// Courses that received a new enrollment in this request.
    pub newly_enrolled: Vec<CourseId>,
    /// Requested courses the student was already enrolled in; left untouched.
    pub already_enrolled: Vec<CourseId>,
    /// Requested courses that were active before this request.
    pub already_active: Vec<CourseId>,
    /// Courses switched from inactive to active by this request.
    pub activated: Vec<CourseId>,
    pub notification: NotificationOutcome,
}

impl EnrollmentReport {
    pub fn stage(&self) -> EnrollmentStage {
        match self.notification {
            NotificationOutcome::Sent => EnrollmentStage::Notified,
            NotificationOutcome::Skipped | NotificationOutcome::Failed(_) => {
                EnrollmentStage::Activated
            }
        }
    }
}

/// The validated plan for one request, built before anything is written.
struct EnrollmentPlan {
    student: Student,
    batch: WriteBatch,
    newly_enrolled: Vec<CourseId>,
    already_enrolled: Vec<CourseId>,
    already_active: Vec<CourseId>,
    activated: Vec<CourseId>,
}

/// Enrolls students in courses and activates those courses.
pub struct EnrollmentService {
    repository: RepositoryRef,
    notifier: NotifierRef,
    max_conflict_retries: u32,
}

impl EnrollmentService {
    pub fn new(repository: RepositoryRef, notifier: NotifierRef, max_conflict_retries: u32) -> Self {
        Self {
            repository,
            notifier,
            max_conflict_retries,
        }
    }

    /// Enrolls `student` in every course in `course_ids`.
    ///
    /// Repeated ids collapse to one. Either every new enrollment and course
    /// activation is committed, or nothing is. The notifier is only called after
    /// a commit, and its failure is reported rather than returned as an error.
    pub async fn enroll<I>(
        &self,
        student: StudentId,
        course_ids: I,
    ) -> Result<EnrollmentReport, EnrollmentError>
    where
        I: IntoIterator<Item = CourseId>,
    {
        let requested: BTreeSet<CourseId> = course_ids.into_iter().collect();
        tracing::debug!(student, courses = ?requested, stage = %EnrollmentStage::Pending);

        let result = self.persist(student, &requested).await;
        let plan = match result {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!(student, stage = %EnrollmentStage::failed(&err), error = %err);
                return Err(err);
            }
        };

        let notification = if plan.newly_enrolled.is_empty() {
            NotificationOutcome::Skipped
        } else {
            self.notify(plan.student.id).await
        };

        let report = EnrollmentReport {
            student,
            newly_enrolled: plan.newly_enrolled,
            already_enrolled: plan.already_enrolled,
            already_active: plan.already_active,
            activated: plan.activated,
            notification,
        };
        tracing::info!(
            student,
            enrolled = report.newly_enrolled.len(),
            activated = report.activated.len(),
            stage = %report.stage(),
            "enrollment completed"
        );
        Ok(report)
    }

    /// Validates and commits, retrying from scratch on write conflicts.
    async fn persist(
        &self,
        student: StudentId,
        requested: &BTreeSet<CourseId>,
    ) -> Result<EnrollmentPlan, EnrollmentError> {
        let mut attempt = 0;
        loop {
            let mut plan = self.plan(student, requested).await?;
            tracing::debug!(student, stage = %EnrollmentStage::Validated, ops = plan.batch.len());
            if plan.batch.is_empty() {
                return Ok(plan);
            }

            match self.repository.commit(std::mem::take(&mut plan.batch)).await {
                Ok(()) => {
                    tracing::debug!(student, stage = %EnrollmentStage::Persisted);
                    tracing::debug!(student, stage = %EnrollmentStage::Activated, courses = ?plan.activated);
                    return Ok(plan);
                }
                Err(StoreError::Conflict(reason)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(student, attempt, %reason, "enrollment conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn plan(
        &self,
        student_id: StudentId,
        requested: &BTreeSet<CourseId>,
    ) -> Result<EnrollmentPlan, EnrollmentError> {
        if requested.is_empty() {
            return Err(EnrollmentError::EmptyCourseSelection);
        }

        let student = self
            .repository
            .get_student(student_id)
            .await?
            .ok_or(EnrollmentError::StudentNotFound(student_id))?;

        let mut found: BTreeMap<CourseId, Course> = BTreeMap::new();
        let mut missing = Vec::new();
        for &id in requested {
            match self.repository.get_course(id).await? {
                Some(course) => {
                    found.insert(id, course);
                }
                None => missing.push(id),
            }
        }
        if !missing.is_empty() {
            return Err(EnrollmentError::CourseNotFound(missing));
        }

        let existing: BTreeSet<CourseId> = self
            .repository
            .enrollments_for_student(student_id)
            .await?
            .into_iter()
            .map(|e| e.course)
            .collect();

        let mut batch = WriteBatch::new();
        let mut newly_enrolled = Vec::new();
        let mut already_enrolled = Vec::new();
        for &id in requested {
            if existing.contains(&id) {
                already_enrolled.push(id);
            } else {
                batch.insert_enrollment(Enrollment::new(student_id, id));
                newly_enrolled.push(id);
            }
        }

        let already_active: Vec<CourseId> = found
            .values()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();

        // Every course the student is enrolled in after this request ends up
        // active, not only the requested ones.
        let mut activated = Vec::new();
        if !newly_enrolled.is_empty() {
            for &id in existing.union(requested) {
                let active = match found.get(&id) {
                    Some(course) => course.active,
                    None => self
                        .repository
                        .get_course(id)
                        .await?
                        .is_some_and(|c| c.active),
                };
                if !active {
                    batch.activate_course(id);
                    activated.push(id);
                }
            }
        }

        Ok(EnrollmentPlan {
            student,
            batch,
            newly_enrolled,
            already_enrolled,
            already_active,
            activated,
        })
    }

    /// Delivers the confirmation. Never fails the request.
    async fn notify(&self, student: StudentId) -> NotificationOutcome {
        match self.notifier.notify_enrollment_confirmed(student).await {
            Ok(()) => {
                tracing::debug!(student, stage = %EnrollmentStage::Notified);
                NotificationOutcome::Sent
            }
            Err(err) => NotificationOutcome::Failed(err.to_string()),
        }
    }
}
