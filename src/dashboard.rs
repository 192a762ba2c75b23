//! Typed calls for the dashboard screens, made through [`AuthClient`].

use std::fmt;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{AuthClient, read_json};
use crate::error::AuthError;

// =============================================================================
// TYPES
// =============================================================================

/// Paginated list envelope used by every list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_bookings: u64,
    pub total_confirmed_bookings: u64,
    pub total_canceled_bookings: u64,
    pub confirmed_last_7_days: u64,
    pub confirmed_last_30_days: u64,
    pub confirmed_last_3_months: u64,
    pub total_students: u64,
    pub total_teachers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_file: Option<String>,
    pub created_at: Option<String>,
}

/// A student or professor account as listed by `/user/users/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub bio: Option<String>,
    pub contact_number: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: u64,
    pub title: String,
    pub professor_details: Option<Member>,
    pub booking_date: String,
    pub time_slot: String,
    pub time_slot_display: Option<String>,
    pub status: BookingStatus,
    pub total_students: Option<u64>,
    pub notes: Option<String>,
    /// Either student ids or full student records, depending on the endpoint.
    #[serde(default)]
    pub students: Vec<serde_json::Value>,
    pub created_at: String,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub approve: bool,
}

/// Which accounts `/user/users/` lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Student,
    Professor,
}

impl MemberRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Professor => "professor",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video file to upload with its metadata.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub title: String,
    pub description: String,
}

// =============================================================================
// CALLS
// =============================================================================

pub struct Dashboard<'a> {
    client: &'a AuthClient,
}

impl<'a> Dashboard<'a> {
    #[must_use]
    pub fn new(client: &'a AuthClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn analytics(&self) -> Result<Analytics, AuthError> {
        self.client.get_json("/dashboard/analytics/").await
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn videos(&self) -> Result<Vec<Video>, AuthError> {
        let page: Page<Video> = self.client.get_json("/dashboard/videos/").await?;
        Ok(page.results)
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request; a missing video is `Api { status: 404, .. }`.
    pub async fn video(&self, id: u64) -> Result<Video, AuthError> {
        self.client.get_json(&format!("/dashboard/videos/{id}/")).await
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn delete_video(&self, id: u64) -> Result<(), AuthError> {
        self.client.send_empty(Method::DELETE, &format!("/dashboard/videos/{id}/")).await?;
        info!(video_id = id, "video deleted");
        Ok(())
    }

    /// Multipart upload with fields `video_file`, `title` and `description`.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn upload_video(&self, upload: &VideoUpload) -> Result<Video, AuthError> {
        let url = self.client.endpoint("/dashboard/videos/");
        let response = self
            .client
            .request(|http| {
                let file = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
                let form = Form::new()
                    .part("video_file", file)
                    .text("title", upload.title.clone())
                    .text("description", upload.description.clone());
                http.post(&url).multipart(form)
            })
            .await?;
        let video: Video = read_json(response).await?;
        info!(video_id = video.id, title = %video.title, "video uploaded");
        Ok(video)
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn bookings(&self, page: u32) -> Result<Page<Booking>, AuthError> {
        self.client.get_json(&format!("/booking/bookings/?page={page}")).await
    }

    /// Cancel (reject) a booking.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn cancel_booking(&self, id: u64) -> Result<(), AuthError> {
        self.client.send_empty(Method::GET, &format!("/booking/bookings/{id}/reject/")).await?;
        info!(booking_id = id, "booking cancelled");
        Ok(())
    }

    /// # Errors
    ///
    /// Any [`AuthError`] from the authenticated request.
    pub async fn members(&self, role: MemberRole, page: u32) -> Result<Page<Member>, AuthError> {
        self.client.get_json(&format!("/user/users/?role={role}&page={page}")).await
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
