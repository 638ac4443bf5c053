use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    media::{MediaKind, MediaPipeline, SourceFile, UploadError, Uploaded},
    models::{
        CreateCourseRequest, DemoCourse, ResumeData, UpdateCourseRequest, UpdateResumeRequest,
    },
    repository::{RepositoryState, StoreError},
};

/// WorkflowError
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("a previous request is still in flight")]
    Busy,
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// InFlight
///
/// Caller-held duplicate-submission flag. Only one guard can be live at a time; the flag
/// clears when the guard drops, whether the request succeeded or not. It coordinates a single
/// editor only, never separate clients.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

/// InFlightGuard
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: &self.busy })
    }

    pub fn is_active(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, WorkflowError> {
        self.try_begin().ok_or(WorkflowError::Busy)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// validate_course_title
pub fn validate_course_title(title: &str) -> Result<(), WorkflowError> {
    if title.trim().is_empty() {
        Err(WorkflowError::Validation("course title is required".to_string()))
    } else {
        Ok(())
    }
}

// --- Course editor ---

/// CourseForm
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseForm {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub file_url: String,
    pub file_name: String,
}

impl CourseForm {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        validate_course_title(&self.title)
    }

    fn to_create(&self) -> CreateCourseRequest {
        CreateCourseRequest {
            title: self.title.clone(),
            description: non_empty(&self.description),
            video_url: non_empty(&self.video_url),
            file_url: non_empty(&self.file_url),
            file_name: non_empty(&self.file_name),
            thumbnail_url: None,
        }
    }

    // The form is written back whole.
    fn to_update(&self) -> UpdateCourseRequest {
        UpdateCourseRequest {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            video_url: Some(self.video_url.clone()),
            file_url: Some(self.file_url.clone()),
            file_name: Some(self.file_name.clone()),
            thumbnail_url: None,
        }
    }
}

impl From<&DemoCourse> for CourseForm {
    fn from(course: &DemoCourse) -> Self {
        Self {
            title: course.title.clone(),
            description: course.description.clone().unwrap_or_default(),
            video_url: course.video_url.clone().unwrap_or_default(),
            file_url: course.file_url.clone().unwrap_or_default(),
            file_name: course.file_name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Default)]
struct CourseEditorState {
    courses: Vec<DemoCourse>,
    editing: Option<Uuid>,
    form: CourseForm,
    open: bool,
}

/// CourseEditor
///
/// Admin workflow for demo courses: a list, one edit dialog, media uploads into the dialog's
/// form, save, delete. Uploads and save share one in-flight flag.
pub struct CourseEditor {
    repo: RepositoryState,
    media: MediaPipeline,
    uploading: InFlight,
    state: Mutex<CourseEditorState>,
}

impl CourseEditor {
    pub async fn load(repo: RepositoryState, media: MediaPipeline) -> Self {
        let courses = repo.get_courses().await;
        Self {
            repo,
            media,
            uploading: InFlight::new(),
            state: Mutex::new(CourseEditorState {
                courses,
                ..CourseEditorState::default()
            }),
        }
    }

    pub fn courses(&self) -> Vec<DemoCourse> {
        lock(&self.state).courses.clone()
    }

    pub fn form(&self) -> CourseForm {
        lock(&self.state).form.clone()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut CourseForm)) {
        edit(&mut lock(&self.state).form);
    }

    pub fn editing(&self) -> Option<Uuid> {
        lock(&self.state).editing
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn is_busy(&self) -> bool {
        self.uploading.is_active()
    }

    pub fn open_new(&self) {
        let mut state = lock(&self.state);
        state.editing = None;
        state.form = CourseForm::default();
        state.open = true;
    }

    pub fn open_existing(&self, id: Uuid) -> Result<(), WorkflowError> {
        let mut state = lock(&self.state);
        let course = state
            .courses
            .iter()
            .find(|c| c.id == id)
            .ok_or(WorkflowError::NotFound("course"))?;
        state.form = CourseForm::from(course);
        state.editing = Some(id);
        state.open = true;
        Ok(())
    }

    pub fn close(&self) {
        lock(&self.state).open = false;
    }

    /// Uploads a video and, only once it is stored, puts its URL into the form.
    pub async fn upload_video(&self, file: SourceFile) -> Result<Uploaded, WorkflowError> {
        let _guard = self.uploading.begin()?;
        let uploaded = self.media.upload(MediaKind::Video, file).await?;
        lock(&self.state).form.video_url = uploaded.url.clone();
        Ok(uploaded)
    }

    pub async fn upload_document(&self, file: SourceFile) -> Result<Uploaded, WorkflowError> {
        let _guard = self.uploading.begin()?;
        let uploaded = self.media.upload(MediaKind::Document, file).await?;
        {
            let mut state = lock(&self.state);
            state.form.file_url = uploaded.url.clone();
            state.form.file_name = uploaded.name.clone().unwrap_or_default();
        }
        Ok(uploaded)
    }

    /// save
    ///
    /// Creates or updates from the form. On success the dialog closes and the list reloads;
    /// on failure the form stays as it was.
    pub async fn save(&self) -> Result<DemoCourse, WorkflowError> {
        let _guard = self.uploading.begin()?;
        let (form, editing) = {
            let state = lock(&self.state);
            (state.form.clone(), state.editing)
        };
        form.validate()?;

        let saved = match editing {
            Some(id) => self
                .repo
                .update_course(id, form.to_update())
                .await?
                .ok_or(WorkflowError::NotFound("course"))?,
            None => self.repo.create_course(form.to_create()).await?,
        };
        tracing::info!(course_id = %saved.id, created = editing.is_none(), "course saved");

        lock(&self.state).open = false;
        self.reload().await;
        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), WorkflowError> {
        if !self.repo.delete_course(id).await? {
            return Err(WorkflowError::NotFound("course"));
        }
        self.reload().await;
        Ok(())
    }

    pub async fn reload(&self) {
        let courses = self.repo.get_courses().await;
        lock(&self.state).courses = courses;
    }
}

// --- Resume editor ---

/// ResumeForm
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeForm {
    pub name: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub photo_url: String,
    pub phone: String,
    pub email: String,
    pub location: String,
    pub self_evaluation: String,
}

impl From<&ResumeData> for ResumeForm {
    fn from(resume: &ResumeData) -> Self {
        Self {
            name: resume.name.clone(),
            title: resume.title.clone(),
            subtitle: resume.subtitle.clone(),
            description: resume.description.clone(),
            photo_url: resume.photo_url.clone(),
            phone: resume.phone.clone(),
            email: resume.email.clone(),
            location: resume.location.clone(),
            self_evaluation: resume.self_evaluation.clone(),
        }
    }
}

impl From<ResumeForm> for UpdateResumeRequest {
    fn from(form: ResumeForm) -> Self {
        Self {
            name: Some(form.name),
            title: Some(form.title),
            subtitle: Some(form.subtitle),
            description: Some(form.description),
            photo_url: Some(form.photo_url),
            phone: Some(form.phone),
            email: Some(form.email),
            location: Some(form.location),
            self_evaluation: Some(form.self_evaluation),
        }
    }
}

#[derive(Default)]
struct ResumeEditorState {
    resume: Option<ResumeData>,
    form: ResumeForm,
}

/// ResumeEditor
///
/// Admin workflow for the singleton resume record: load, edit, upload a photo, save all fields.
pub struct ResumeEditor {
    repo: RepositoryState,
    media: MediaPipeline,
    uploading: InFlight,
    saving: InFlight,
    state: Mutex<ResumeEditorState>,
}

impl ResumeEditor {
    pub async fn load(repo: RepositoryState, media: MediaPipeline) -> Self {
        let resume = repo.get_resume().await;
        let form = resume.as_ref().map(ResumeForm::from).unwrap_or_default();
        Self {
            repo,
            media,
            uploading: InFlight::new(),
            saving: InFlight::new(),
            state: Mutex::new(ResumeEditorState { resume, form }),
        }
    }

    pub fn resume(&self) -> Option<ResumeData> {
        lock(&self.state).resume.clone()
    }

    pub fn form(&self) -> ResumeForm {
        lock(&self.state).form.clone()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut ResumeForm)) {
        edit(&mut lock(&self.state).form);
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.is_active()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_active()
    }

    pub async fn upload_photo(&self, file: SourceFile) -> Result<Uploaded, WorkflowError> {
        let _guard = self.uploading.begin()?;
        let uploaded = self.media.upload(MediaKind::Image, file).await?;
        lock(&self.state).form.photo_url = uploaded.url.clone();
        Ok(uploaded)
    }

    /// save
    ///
    /// Writes every form field. Without a loaded resume there is nothing to update.
    pub async fn save(&self) -> Result<ResumeData, WorkflowError> {
        let _guard = self.saving.begin()?;
        let (id, form) = {
            let state = lock(&self.state);
            let id = state
                .resume
                .as_ref()
                .map(|r| r.id)
                .ok_or(WorkflowError::NotFound("resume"))?;
            (id, state.form.clone())
        };

        let updated = self
            .repo
            .update_resume(id, form.into())
            .await?
            .ok_or(WorkflowError::NotFound("resume"))?;

        let mut state = lock(&self.state);
        state.form = ResumeForm::from(&updated);
        state.resume = Some(updated.clone());
        Ok(updated)
    }
}
