use crate::models::{
    CreateCourseRequest, DemoCourse, Honor, ResumeData, Skill, UpdateCourseRequest,
    UpdateResumeRequest, User, WorkExperience,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// StoreError
///
/// Failure of a write against the relational store. Reads never surface it; they log and
/// degrade to empty/None instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Repository Trait
///
/// The record CRUD gateway. Read methods return plain values (an empty list or `None` when
/// the query fails, so callers cannot tell "absent" from "failed"); write methods return
/// `Result` and the caller decides how to surface the failure.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Resume ---
    async fn get_resume(&self) -> Option<ResumeData>;
    // Partial update; always stamps updated_at. Ok(None) when no record has this id.
    async fn update_resume(
        &self,
        id: Uuid,
        req: UpdateResumeRequest,
    ) -> Result<Option<ResumeData>, StoreError>;
    async fn get_work_experiences(&self, resume_id: Uuid) -> Vec<WorkExperience>;
    async fn get_skills(&self, resume_id: Uuid) -> Vec<Skill>;
    async fn get_honors(&self, resume_id: Uuid) -> Vec<Honor>;

    // --- Demo courses ---
    async fn get_courses(&self) -> Vec<DemoCourse>;
    async fn get_course(&self, id: Uuid) -> Option<DemoCourse>;
    // Assigns sort_order = number of existing courses.
    async fn create_course(&self, req: CreateCourseRequest) -> Result<DemoCourse, StoreError>;
    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<DemoCourse>, StoreError>;
    // Remaining courses keep their sort_order; gaps are never compacted.
    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Profiles ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
}

/// RepositoryState
pub type RepositoryState = Arc<dyn Repository>;

const RESUME_COLUMNS: &str = "id, name, title, subtitle, description, photo_url, phone, email, \
     location, birth_date, education, university, political_status, self_evaluation, \
     created_at, updated_at";

const COURSE_COLUMNS: &str = "id, title, description, video_url, file_url, file_name, \
     thumbnail_url, sort_order, created_at, updated_at";

/// PostgresRepository
///
/// `Repository` backed by the hosted Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_resume(&self) -> Option<ResumeData> {
        let query = format!("SELECT {} FROM resume_data LIMIT 1", RESUME_COLUMNS);
        sqlx::query_as::<_, ResumeData>(&query)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_resume error: {:?}", e);
                None
            })
    }

    /// update_resume
    ///
    /// COALESCE keeps the stored value for every `None` field.
    async fn update_resume(
        &self,
        id: Uuid,
        req: UpdateResumeRequest,
    ) -> Result<Option<ResumeData>, StoreError> {
        let query = format!(
            r#"
            UPDATE resume_data
            SET name = COALESCE($2, name),
                title = COALESCE($3, title),
                subtitle = COALESCE($4, subtitle),
                description = COALESCE($5, description),
                photo_url = COALESCE($6, photo_url),
                phone = COALESCE($7, phone),
                email = COALESCE($8, email),
                location = COALESCE($9, location),
                self_evaluation = COALESCE($10, self_evaluation),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESUME_COLUMNS
        );

        sqlx::query_as::<_, ResumeData>(&query)
            .bind(id)
            .bind(req.name)
            .bind(req.title)
            .bind(req.subtitle)
            .bind(req.description)
            .bind(req.photo_url)
            .bind(req.phone)
            .bind(req.email)
            .bind(req.location)
            .bind(req.self_evaluation)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("update_resume error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn get_work_experiences(&self, resume_id: Uuid) -> Vec<WorkExperience> {
        sqlx::query_as::<_, WorkExperience>(
            "SELECT id, resume_id, title, company, start_date, end_date, description, skills, \
             level, sort_order, created_at FROM work_experiences WHERE resume_id = $1 \
             ORDER BY sort_order ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_work_experiences error: {:?}", e);
            vec![]
        })
    }

    async fn get_skills(&self, resume_id: Uuid) -> Vec<Skill> {
        sqlx::query_as::<_, Skill>(
            "SELECT id, resume_id, category, title, description, tags, sort_order, created_at \
             FROM skills WHERE resume_id = $1 ORDER BY sort_order ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_skills error: {:?}", e);
            vec![]
        })
    }

    async fn get_honors(&self, resume_id: Uuid) -> Vec<Honor> {
        sqlx::query_as::<_, Honor>(
            "SELECT id, resume_id, name, sort_order, created_at FROM honors \
             WHERE resume_id = $1 ORDER BY sort_order ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_honors error: {:?}", e);
            vec![]
        })
    }

    async fn get_courses(&self) -> Vec<DemoCourse> {
        let query = format!(
            "SELECT {} FROM demo_courses ORDER BY sort_order ASC, created_at ASC",
            COURSE_COLUMNS
        );
        sqlx::query_as::<_, DemoCourse>(&query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_courses error: {:?}", e);
                vec![]
            })
    }

    async fn get_course(&self, id: Uuid) -> Option<DemoCourse> {
        let query = format!("SELECT {} FROM demo_courses WHERE id = $1", COURSE_COLUMNS);
        sqlx::query_as::<_, DemoCourse>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_course error: {:?}", e);
                None
            })
    }

    /// create_course
    ///
    /// The sort order is the row count at insert time, computed in the same statement.
    async fn create_course(&self, req: CreateCourseRequest) -> Result<DemoCourse, StoreError> {
        let query = format!(
            r#"
            INSERT INTO demo_courses
                (id, title, description, video_url, file_url, file_name, thumbnail_url,
                 sort_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    (SELECT COUNT(*) FROM demo_courses)::INT, NOW(), NOW())
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        sqlx::query_as::<_, DemoCourse>(&query)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.description)
            .bind(req.video_url)
            .bind(req.file_url)
            .bind(req.file_name)
            .bind(req.thumbnail_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("create_course error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<DemoCourse>, StoreError> {
        let query = format!(
            r#"
            UPDATE demo_courses
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                video_url = COALESCE($4, video_url),
                file_url = COALESCE($5, file_url),
                file_name = COALESCE($6, file_name),
                thumbnail_url = COALESCE($7, thumbnail_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COURSE_COLUMNS
        );

        sqlx::query_as::<_, DemoCourse>(&query)
            .bind(id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.video_url)
            .bind(req.file_url)
            .bind(req.file_name)
            .bind(req.thumbnail_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("update_course error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM demo_courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("delete_course error: {:?}", e);
                StoreError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, username, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct Tables {
    resume: Option<ResumeData>,
    work_experiences: Vec<WorkExperience>,
    skills: Vec<Skill>,
    honors: Vec<Honor>,
    courses: Vec<DemoCourse>,
    users: Vec<User>,
}

/// MemoryRepository
///
/// `Repository` over in-process tables with the same ordering and error contract as the
/// Postgres implementation. `new_failing` simulates an unreachable store.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    failing: bool,
}

fn by_sort_order<T: Clone>(rows: &[T], key: impl Fn(&T) -> i32) -> Vec<T> {
    let mut rows = rows.to_vec();
    rows.sort_by_key(|row| key(row));
    rows
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("tables poisoned".to_string()))
    }

    fn read<T>(&self, op: &str, f: impl FnOnce(&Tables) -> T) -> Option<T> {
        match self.tables() {
            Ok(tables) => Some(f(&*tables)),
            Err(e) => {
                tracing::error!("{} error: {:?}", op, e);
                None
            }
        }
    }

    pub fn with_resume(self, resume: ResumeData) -> Self {
        self.seed(|t| t.resume = Some(resume))
    }

    pub fn with_user(self, user: User) -> Self {
        self.seed(|t| t.users.push(user))
    }

    pub fn with_course(self, course: DemoCourse) -> Self {
        self.seed(|t| t.courses.push(course))
    }

    pub fn with_work_experience(self, row: WorkExperience) -> Self {
        self.seed(|t| t.work_experiences.push(row))
    }

    pub fn with_skill(self, row: Skill) -> Self {
        self.seed(|t| t.skills.push(row))
    }

    pub fn with_honor(self, row: Honor) -> Self {
        self.seed(|t| t.honors.push(row))
    }

    fn seed(self, f: impl FnOnce(&mut Tables)) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            f(&mut *tables);
        }
        self
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_resume(&self) -> Option<ResumeData> {
        self.read("get_resume", |t| t.resume.clone()).flatten()
    }

    async fn update_resume(
        &self,
        id: Uuid,
        req: UpdateResumeRequest,
    ) -> Result<Option<ResumeData>, StoreError> {
        let mut tables = self.tables()?;
        let Some(resume) = tables.resume.as_mut().filter(|r| r.id == id) else {
            return Ok(None);
        };

        let fields = [
            (&mut resume.name, req.name),
            (&mut resume.title, req.title),
            (&mut resume.subtitle, req.subtitle),
            (&mut resume.description, req.description),
            (&mut resume.photo_url, req.photo_url),
            (&mut resume.phone, req.phone),
            (&mut resume.email, req.email),
            (&mut resume.location, req.location),
            (&mut resume.self_evaluation, req.self_evaluation),
        ];
        for (slot, value) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        resume.updated_at = Utc::now();
        Ok(Some(resume.clone()))
    }

    async fn get_work_experiences(&self, resume_id: Uuid) -> Vec<WorkExperience> {
        self.read("get_work_experiences", |t| {
            let rows: Vec<_> = t
                .work_experiences
                .iter()
                .filter(|r| r.resume_id == resume_id)
                .cloned()
                .collect();
            by_sort_order(&rows, |r| r.sort_order)
        })
        .unwrap_or_default()
    }

    async fn get_skills(&self, resume_id: Uuid) -> Vec<Skill> {
        self.read("get_skills", |t| {
            let rows: Vec<_> = t
                .skills
                .iter()
                .filter(|r| r.resume_id == resume_id)
                .cloned()
                .collect();
            by_sort_order(&rows, |r| r.sort_order)
        })
        .unwrap_or_default()
    }

    async fn get_honors(&self, resume_id: Uuid) -> Vec<Honor> {
        self.read("get_honors", |t| {
            let rows: Vec<_> = t
                .honors
                .iter()
                .filter(|r| r.resume_id == resume_id)
                .cloned()
                .collect();
            by_sort_order(&rows, |r| r.sort_order)
        })
        .unwrap_or_default()
    }

    async fn get_courses(&self) -> Vec<DemoCourse> {
        self.read("get_courses", |t| by_sort_order(&t.courses, |c| c.sort_order))
            .unwrap_or_default()
    }

    async fn get_course(&self, id: Uuid) -> Option<DemoCourse> {
        self.read("get_course", |t| t.courses.iter().find(|c| c.id == id).cloned())
            .flatten()
    }

    async fn create_course(&self, req: CreateCourseRequest) -> Result<DemoCourse, StoreError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let course = DemoCourse {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            video_url: req.video_url,
            file_url: req.file_url,
            file_name: req.file_name,
            thumbnail_url: req.thumbnail_url,
            sort_order: tables.courses.len() as i32,
            created_at: now,
            updated_at: now,
        };
        tables.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<DemoCourse>, StoreError> {
        let mut tables = self.tables()?;
        let Some(course) = tables.courses.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        if let Some(title) = req.title {
            course.title = title;
        }
        let optional = [
            (&mut course.description, req.description),
            (&mut course.video_url, req.video_url),
            (&mut course.file_url, req.file_url),
            (&mut course.file_name, req.file_name),
            (&mut course.thumbnail_url, req.thumbnail_url),
        ];
        for (slot, value) in optional {
            if value.is_some() {
                *slot = value;
            }
        }
        course.updated_at = Utc::now();
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.courses.len();
        tables.courses.retain(|c| c.id != id);
        Ok(tables.courses.len() < before)
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.read("get_user", |t| t.users.iter().find(|u| u.id == id).cloned())
            .flatten()
    }
}
