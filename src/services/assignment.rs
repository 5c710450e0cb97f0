//! Assignment service
//!
//! Assignment CRUD and the grade engine. Grading is instructor-only and
//! upserts in place on the unique (assignment, student) pair; listing is
//! role-scoped so a student only ever sees their own grade. Deleting an
//! assignment removes its grades first, so no orphaned grade is observable.

use crate::db::repositories::{
    AssignmentRepository, AssignmentWithClass, GradeRepository,
};
use crate::models::{Assignment, Class, ClassRole, Grade, User};
use crate::services::class::{ClassService, ClassServiceError};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for assignment service operations
#[derive(Debug, thiserror::Error)]
pub enum AssignmentServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced class or assignment not found
    #[error("{0}")]
    NotFound(String),

    /// Caller lacks the required role
    #[error("{0}")]
    Forbidden(String),

    /// Conflicting state
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ClassServiceError> for AssignmentServiceError {
    fn from(err: ClassServiceError) -> Self {
        match err {
            ClassServiceError::ValidationError(msg) => Self::ValidationError(msg),
            ClassServiceError::NotFound(msg) => Self::NotFound(msg),
            ClassServiceError::Forbidden(msg) => Self::Forbidden(msg),
            ClassServiceError::Conflict(msg) => Self::Conflict(msg),
            ClassServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// An assignment annotated with the calling student's own grade, if any.
/// `user_grade` is always `None` for instructor callers.
#[derive(Debug, Clone)]
pub struct AssignmentView {
    pub assignment: Assignment,
    pub user_grade: Option<Grade>,
}

/// One member row in the instructor's aggregate grade view. `grade` is
/// `None` for members not yet graded; they are listed, not omitted.
#[derive(Debug, Clone)]
pub struct MemberGradeRow {
    pub student: User,
    pub grade: Option<Grade>,
}

/// All member rows for one assignment in the instructor's aggregate view
#[derive(Debug, Clone)]
pub struct AssignmentGradeRows {
    pub assignment: Assignment,
    pub rows: Vec<MemberGradeRow>,
}

/// One of a student's own grade records, annotated with its assignment
#[derive(Debug, Clone)]
pub struct StudentGradeEntry {
    pub assignment: Assignment,
    pub grade: Grade,
}

/// Role-scoped aggregate grade view for a class
#[derive(Debug, Clone)]
pub enum GradeReport {
    /// Every (assignment, member) pair, graded or not
    Instructor(Vec<AssignmentGradeRows>),
    /// Only the caller's own grade records
    Student(Vec<StudentGradeEntry>),
}

/// Assignment service
pub struct AssignmentService {
    assignment_repo: Arc<dyn AssignmentRepository>,
    grade_repo: Arc<dyn GradeRepository>,
    classes: Arc<ClassService>,
}

impl AssignmentService {
    /// Create a new assignment service
    pub fn new(
        assignment_repo: Arc<dyn AssignmentRepository>,
        grade_repo: Arc<dyn GradeRepository>,
        classes: Arc<ClassService>,
    ) -> Self {
        Self {
            assignment_repo,
            grade_repo,
            classes,
        }
    }

    /// Create an assignment. Instructor-only.
    pub async fn create_assignment(
        &self,
        user_id: i64,
        input: CreateAssignmentInput,
    ) -> Result<Assignment, AssignmentServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AssignmentServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        let description = input.description.trim().to_string();
        if description.is_empty() {
            return Err(AssignmentServiceError::ValidationError(
                "Description cannot be empty".to_string(),
            ));
        }
        if !input.points_possible.is_finite() || input.points_possible < 0.0 {
            return Err(AssignmentServiceError::ValidationError(
                "Points possible must be a non-negative number".to_string(),
            ));
        }

        let class = self
            .classes
            .require_instructor(user_id, input.class_id, "create assignments")
            .await?;

        let now = Utc::now();
        let assignment = Assignment {
            id: 0,
            class_id: class.id,
            title,
            description,
            due_date: input.due_date,
            points_possible: input.points_possible,
            created_by: user_id,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .assignment_repo
            .create(&assignment)
            .await
            .context("Failed to create assignment")?;

        Ok(created)
    }

    /// List a class's assignments, ascending by due date. Student callers
    /// get each assignment annotated with their own grade and nothing else;
    /// no other student's grade is ever attached.
    pub async fn list_for_class(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<Vec<AssignmentView>, AssignmentServiceError> {
        let (class, role) = self.classes.require_access(user_id, class_id).await?;

        let assignments = self
            .assignment_repo
            .list_by_class(class.id)
            .await
            .context("Failed to list assignments")?;

        let mut own_grades: HashMap<i64, Grade> = HashMap::new();
        if role == ClassRole::Student {
            let grades = self
                .grade_repo
                .list_for_student_in_class(class.id, user_id)
                .await
                .context("Failed to list grades")?;
            own_grades = grades.into_iter().map(|g| (g.assignment_id, g)).collect();
        }

        Ok(assignments
            .into_iter()
            .map(|assignment| {
                let user_grade = own_grades.remove(&assignment.id);
                AssignmentView {
                    assignment,
                    user_grade,
                }
            })
            .collect())
    }

    /// List assignments across every class the caller created or joined,
    /// ascending by due date, each annotated with its class name.
    pub async fn my_assignments(
        &self,
        user_id: i64,
    ) -> Result<Vec<AssignmentWithClass>, AssignmentServiceError> {
        let assignments = self
            .assignment_repo
            .list_for_user(user_id)
            .await
            .context("Failed to list assignments")?;

        Ok(assignments)
    }

    /// Record a grade. Instructor-only; the target student must currently
    /// be a member; the score must be a finite number within
    /// [0, points_possible]. An existing (assignment, student) grade is
    /// overwritten in place, never duplicated.
    pub async fn grade(
        &self,
        user_id: i64,
        input: GradeInput,
    ) -> Result<Grade, AssignmentServiceError> {
        let assignment = self
            .assignment_repo
            .get_by_id(input.assignment_id)
            .await
            .context("Failed to get assignment")?
            .ok_or_else(|| {
                AssignmentServiceError::NotFound("Assignment not found".to_string())
            })?;

        self.classes
            .require_instructor(user_id, assignment.class_id, "grade assignments")
            .await?;

        if !self
            .classes
            .is_member(input.student_id, assignment.class_id)
            .await?
        {
            return Err(AssignmentServiceError::ValidationError(
                "Student is not a member of this class".to_string(),
            ));
        }

        if !input.score.is_finite() || input.score < 0.0 || input.score > assignment.points_possible
        {
            return Err(AssignmentServiceError::ValidationError(format!(
                "Score must be between 0 and {}",
                assignment.points_possible
            )));
        }

        let feedback = input.feedback.unwrap_or_default();
        let grade = self
            .grade_repo
            .upsert(
                assignment.id,
                input.student_id,
                input.score,
                feedback.trim(),
                user_id,
            )
            .await
            .context("Failed to record grade")?;

        Ok(grade)
    }

    /// Role-scoped aggregate grade view for a class.
    ///
    /// Instructors get a row for every (assignment, member) pair with
    /// ungraded members explicitly present; students get only their own
    /// grade records, each carrying its assignment.
    pub async fn grades_for_class(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<GradeReport, AssignmentServiceError> {
        let (class, role) = self.classes.require_access(user_id, class_id).await?;

        let assignments = self
            .assignment_repo
            .list_by_class(class.id)
            .await
            .context("Failed to list assignments")?;

        match role {
            ClassRole::Instructor => self.instructor_report(&class, assignments).await,
            ClassRole::Student => self.student_report(&class, user_id, assignments).await,
        }
    }

    /// Delete an assignment and every grade referencing it. Instructor-only.
    pub async fn delete_assignment(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> Result<(), AssignmentServiceError> {
        let assignment = self
            .assignment_repo
            .get_by_id(assignment_id)
            .await
            .context("Failed to get assignment")?
            .ok_or_else(|| {
                AssignmentServiceError::NotFound("Assignment not found".to_string())
            })?;

        self.classes
            .require_instructor(user_id, assignment.class_id, "delete assignments")
            .await?;

        // Grades go first so a failure cannot leave them orphaned
        self.grade_repo
            .delete_by_assignment(assignment.id)
            .await
            .context("Failed to delete grades")?;
        self.assignment_repo
            .delete(assignment.id)
            .await
            .context("Failed to delete assignment")?;

        Ok(())
    }

    async fn instructor_report(
        &self,
        class: &Class,
        assignments: Vec<Assignment>,
    ) -> Result<GradeReport, AssignmentServiceError> {
        let members = self.classes.members(class.id).await?;

        let mut report = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let grades = self
                .grade_repo
                .list_by_assignment(assignment.id)
                .await
                .context("Failed to list grades")?;
            let mut by_student: HashMap<i64, Grade> =
                grades.into_iter().map(|g| (g.student_id, g)).collect();

            let rows = members
                .iter()
                .map(|student| MemberGradeRow {
                    student: student.clone(),
                    grade: by_student.remove(&student.id),
                })
                .collect();

            report.push(AssignmentGradeRows { assignment, rows });
        }

        Ok(GradeReport::Instructor(report))
    }

    async fn student_report(
        &self,
        class: &Class,
        student_id: i64,
        assignments: Vec<Assignment>,
    ) -> Result<GradeReport, AssignmentServiceError> {
        let grades = self
            .grade_repo
            .list_for_student_in_class(class.id, student_id)
            .await
            .context("Failed to list grades")?;
        let mut by_assignment: HashMap<i64, Grade> =
            grades.into_iter().map(|g| (g.assignment_id, g)).collect();

        let entries = assignments
            .into_iter()
            .filter_map(|assignment| {
                by_assignment
                    .remove(&assignment.id)
                    .map(|grade| StudentGradeEntry { assignment, grade })
            })
            .collect();

        Ok(GradeReport::Student(entries))
    }
}

/// Input for assignment creation
#[derive(Debug, Clone)]
pub struct CreateAssignmentInput {
    pub class_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub points_possible: f64,
}

/// Input for recording a grade
#[derive(Debug, Clone)]
pub struct GradeInput {
    pub assignment_id: i64,
    pub student_id: i64,
    pub score: f64,
    pub feedback: Option<String>,
}
