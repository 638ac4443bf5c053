use crate::{
    AppState,
    auth::{self, ACCESS_TOKEN_COOKIE, AdminUser, AuthUser},
    error::AppError,
    guard::HOME_PATH,
    media::{MediaKind, SourceFile},
    models::{
        CoursesPage, CreateCourseRequest, DemoCourse, LoginPage, LoginRequest, LoginResponse,
        MeResponse, ResumeBundle, ResumeData, StatusPage, UpdateCourseRequest,
        UpdateResumeRequest, UploadResponse,
    },
    session::{self, Session},
    workflow::validate_course_title,
};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// LoginQuery
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LoginQuery {
    /// The page the visitor was redirected away from.
    pub from: Option<String>,
}

/// CourseQuery
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CourseQuery {
    /// Pre-selects a course; defaults to the first one.
    pub course: Option<Uuid>,
}

async fn load_bundle(state: &AppState) -> ResumeBundle {
    let resume = state.repo.get_resume().await;
    let Some(resume_id) = resume.as_ref().map(|r| r.id) else {
        return ResumeBundle::default();
    };

    let (work_experiences, skills, honors) = tokio::join!(
        state.repo.get_work_experiences(resume_id),
        state.repo.get_skills(resume_id),
        state.repo.get_honors(resume_id),
    );

    ResumeBundle {
        resume,
        work_experiences,
        skills,
        honors,
    }
}

fn session_cookie(token: &str, max_age: i64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age
    ))
    .map_err(|_| AppError::Auth("provider issued an unusable token".to_string()))
}

// The redirect target must stay on this site.
fn safe_redirect(from: Option<String>) -> String {
    from.filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| HOME_PATH.to_string())
}

// --- Public API ---

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Alive")))]
pub async fn health() -> &'static str {
    "ok"
}

/// get_resume
///
/// [Public Route] The resume record with its experiences, skills and honors. An unreadable
/// store yields an empty bundle, not an error.
#[utoipa::path(
    get,
    path = "/api/resume",
    responses((status = 200, description = "Resume bundle", body = ResumeBundle))
)]
pub async fn get_resume(State(state): State<AppState>) -> Json<ResumeBundle> {
    Json(load_bundle(&state).await)
}

#[utoipa::path(
    get,
    path = "/api/courses",
    responses((status = 200, description = "Courses by sort order", body = [DemoCourse]))
)]
pub async fn get_courses(State(state): State<AppState>) -> Json<Vec<DemoCourse>> {
    Json(state.repo.get_courses().await)
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = DemoCourse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DemoCourse>, AppError> {
    state
        .repo
        .get_course(id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("course"))
}

/// login
///
/// [Public Route] Username/password sign-in through the auth provider. The username is
/// validated before the provider is contacted. On success the access token is returned and
/// also set as the `access_token` cookie for page navigations.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid username"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let (principal, signed_in) = session::sign_in(
        state.auth.as_ref(),
        state.repo.as_ref(),
        &payload.username,
        &payload.password,
    )
    .await?;

    let cookie = session_cookie(&signed_in.access_token, signed_in.expires_in)?;
    let body = LoginResponse {
        access_token: signed_in.access_token,
        user_id: principal.id,
        role: principal.role,
        redirect_to: safe_redirect(payload.from),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

// --- Authenticated API ---

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current principal", body = MeResponse),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(AuthUser { id, role }: AuthUser) -> Json<MeResponse> {
    Json(MeResponse { id, role })
}

/// logout
///
/// [Authenticated Route] Revokes the provider session (when the request carried a token) and
/// clears the cookie. A failed revocation is logged; the response is still 204.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    // The cookie is cleared even when the provider cannot revoke the session.
    if let Some(token) = auth::bearer_token(&headers) {
        if let Err(e) = state.auth.sign_out(&token).await {
            tracing::warn!(user_id = %id, error = %e, "provider sign-out failed");
        }
    }
    tracing::info!(user_id = %id, "signed out");

    let cookie = session_cookie("", 0)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

// --- Admin API ---

/// update_resume
///
/// [Admin Route] Partial update of the resume record; `updated_at` is always stamped.
#[utoipa::path(
    put,
    path = "/api/admin/resume/{id}",
    params(("id" = Uuid, Path, description = "Resume ID")),
    request_body = UpdateResumeRequest,
    responses(
        (status = 200, description = "Updated", body = ResumeData),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_resume(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeData>, AppError> {
    let updated = state
        .repo
        .update_resume(id, payload)
        .await?
        .ok_or(AppError::NotFound("resume"))?;
    tracing::info!(admin_id = %admin.id, resume_id = %id, "resume updated");
    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/api/admin/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = DemoCourse),
        (status = 400, description = "Missing title")
    )
)]
pub async fn create_course(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<DemoCourse>), AppError> {
    validate_course_title(&payload.title)?;
    let course = state.repo.create_course(payload).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    put,
    path = "/api/admin/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated", body = DemoCourse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_course(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<DemoCourse>, AppError> {
    if let Some(title) = &payload.title {
        validate_course_title(title)?;
    }
    state
        .repo
        .update_course(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("course"))
}

#[utoipa::path(
    delete,
    path = "/api/admin/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_course(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_course(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("course"))
    }
}

/// upload_media
///
/// [Admin Route] Runs the `file` field of a multipart body through the media pipeline for the
/// given kind (`image`, `video` or `document`) and returns the stored object's public URL.
/// Nothing is written to the records; the client attaches the URL with a separate update.
#[utoipa::path(
    post,
    path = "/api/admin/uploads/{kind}",
    params(("kind" = String, Path, description = "image | video | document")),
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "Unsupported type or too large"),
        (status = 409, description = "Key already taken"),
        (status = 422, description = "Image could not be compressed")
    )
)]
pub async fn upload_media(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(kind): Path<MediaKind>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut source = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        source = Some(SourceFile::new(bytes.to_vec(), &content_type, &original_name));
        break;
    }

    let file = source.ok_or_else(|| AppError::Validation("missing multipart field `file`".to_string()))?;
    let uploaded = state.media.upload(kind, file).await?;

    Ok(Json(UploadResponse {
        url: uploaded.url,
        key: uploaded.key,
        content_type: uploaded.content_type,
        name: uploaded.name,
    }))
}

// --- Pages (behind the route guard) ---

pub async fn home_page(State(state): State<AppState>) -> Json<ResumeBundle> {
    Json(load_bundle(&state).await)
}

/// courses_page
///
/// The course list with one selected course. Admins additionally see the manage link.
pub async fn courses_page(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<CourseQuery>,
) -> Json<CoursesPage> {
    let courses = state.repo.get_courses().await;
    let selected = query
        .course
        .and_then(|id| courses.iter().find(|c| c.id == id))
        .or_else(|| courses.first())
        .cloned();

    Json(CoursesPage {
        courses,
        selected,
        can_manage: session.is_admin(),
    })
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        from: safe_redirect(query.from),
    })
}

pub async fn forbidden_page() -> (StatusCode, Json<StatusPage>) {
    status_page(StatusCode::FORBIDDEN, "You do not have access to this page.")
}

pub async fn not_found_page() -> (StatusCode, Json<StatusPage>) {
    status_page(StatusCode::NOT_FOUND, "Page not found.")
}

fn status_page(status: StatusCode, message: &str) -> (StatusCode, Json<StatusPage>) {
    (
        status,
        Json(StatusPage {
            status: status.as_u16(),
            message: message.to_string(),
        }),
    )
}

pub async fn admin_edit_page(State(state): State<AppState>) -> Json<ResumeBundle> {
    Json(load_bundle(&state).await)
}

pub async fn admin_courses_page(State(state): State<AppState>) -> Json<Vec<DemoCourse>> {
    Json(state.repo.get_courses().await)
}
