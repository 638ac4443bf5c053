use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{guard::Navigation, session::Role};

// --- Core Records (Mapped to Database) ---

/// User
///
/// The principal's profile row in `public.profiles`. Only the role matters for access control.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key, also the Foreign Key to the external auth.users table.
    pub id: Uuid,
    pub username: String,
    // 'admin' or anything else (treated as a plain user).
    pub role: String,
}

/// ResumeData
///
/// The singleton profile record in `public.resume_data`. Mutated only by the admin editor.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ResumeData {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub photo_url: String,
    pub phone: String,
    pub email: String,
    pub location: String,
    pub birth_date: Option<String>,
    pub education: Option<String>,
    pub university: Option<String>,
    pub political_status: Option<String>,
    pub self_evaluation: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// WorkExperience
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct WorkExperience {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub skills: Vec<String>,
    pub level: Option<String>,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Skill
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Skill {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub category: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Honor
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Honor {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub name: String,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// DemoCourse
///
/// A demo-course record from `public.demo_courses`. Media fields hold public URLs returned by
/// the upload pipeline. `sort_order` is assigned once at creation and never compacted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct DemoCourse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// UpdateResumeRequest
///
/// Partial update for the resume record. Only `Some` fields are written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UpdateResumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_evaluation: Option<String>,
}

/// CreateCourseRequest
///
/// Input payload for POST /api/admin/courses. The sort order is not accepted from the
/// client; the gateway assigns it from the current record count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// UpdateCourseRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// LoginRequest
///
/// Username/password sign-in. `from` carries the page the guard redirected away from.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "admin")]
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

// --- Output Schemas ---

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: Uuid,
    pub role: Role,
    /// Where the client should navigate next (history replacement).
    pub redirect_to: String,
}

/// MeResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub id: Uuid,
    pub role: Role,
}

/// UploadResponse
///
/// Result of the media pipeline. `name` is only present for documents (original display name).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// ResumeBundle
///
/// Everything the visitor-facing resume page shows, in one payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ResumeBundle {
    pub resume: Option<ResumeData>,
    pub work_experiences: Vec<WorkExperience>,
    pub skills: Vec<Skill>,
    pub honors: Vec<Honor>,
}

/// CoursesPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CoursesPage {
    pub courses: Vec<DemoCourse>,
    pub selected: Option<DemoCourse>,
    /// True when the viewer is an admin, enabling the "manage courses" link.
    pub can_manage: bool,
}

/// LoginPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginPage {
    pub from: String,
}

/// StatusPage
///
/// Body for the `/403` and `/404` pages and the unmatched-route fallback.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StatusPage {
    pub status: u16,
    pub message: String,
}

/// RedirectBody
///
/// Body returned alongside a guard redirect so API-style clients can follow it too.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedirectBody {
    pub redirect: Navigation,
}
