/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::auth::middleware::{reject_when_disabled, require_employee};
use crate::database::definitions::employee::Employee;
use crate::database::definitions::submission::{
    ProjectType, SubmissionKind, SubmissionView, WriteSubmission,
};
use crate::hook::notify_employees;
use crate::lifecycle::{list_for_employee, AcceptSubmission, CompleteSubmission, ListOptions};
use crate::prelude::*;
use crate::storage::{with_upload, Upload};
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use chrono::NaiveDate;
use std::future::IntoFuture;
use std::str::FromStr;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

// room for the text fields and multipart framing next to the file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub fn router(state: ApplicationState) -> Router {
    let reading = Router::new()
        .route("/", get(list_submissions))
        .route_layer(from_fn_with_state(state.clone(), require_employee));
    let updating = Router::new()
        .route("/status", put(update_status))
        .route_layer(from_fn_with_state(state.clone(), require_employee))
        .route_layer(from_fn_with_state(state.clone(), reject_when_disabled));
    let uploads = Router::new()
        .route(
            "/assignment",
            post(create_assignment).layer(body_limit(SubmissionKind::Assignment)),
        )
        .route(
            "/project",
            post(create_project).layer(body_limit(SubmissionKind::ProjectAssistance)),
        )
        .route_layer(TimeoutLayer::new(UPLOAD_TIMEOUT))
        .route_layer(from_fn_with_state(state.clone(), reject_when_disabled));

    Router::new()
        .merge(reading)
        .merge(updating)
        .merge(uploads)
        .with_state(state)
}

fn body_limit(kind: SubmissionKind) -> DefaultBodyLimit {
    DefaultBodyLimit::max(kind.max_file_size() + MULTIPART_OVERHEAD)
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreated {
    message: String,
    submission_id: Id,
    file_link: String,
}

async fn create_assignment(
    State(state): State<ApplicationState>,
    multipart: Multipart,
) -> Result<Json<SubmissionCreated>> {
    create_submission(&state, SubmissionKind::Assignment, multipart).await
}

async fn create_project(
    State(state): State<ApplicationState>,
    multipart: Multipart,
) -> Result<Json<SubmissionCreated>> {
    create_submission(&state, SubmissionKind::ProjectAssistance, multipart).await
}

async fn create_submission(
    state: &ApplicationState,
    kind: SubmissionKind,
    multipart: Multipart,
) -> Result<Json<SubmissionCreated>> {
    let (mut write, upload) = read_form(kind, multipart, state.connection()).await?;
    // nothing is uploaded before the form itself is complete
    write.validate()?;
    let upload = upload.ok_or(ApplicationError::MissingField("File"))?;
    upload.validate(kind)?;

    let submission = with_upload(
        state.storage(),
        state.config().folder(kind),
        &upload,
        move |object| write.set_file_link(Some(object.link)).to_owned().into_future(),
    )
    .await?;
    info!("Received new {} {}", kind, submission.id());

    // best effort, the student already has their confirmation
    let notifier = state.clone();
    tokio::spawn(async move {
        if let Err(error) = notify_employees(&notifier, kind).await {
            warn!("Unable to notify employees about a new {}: {}", kind, error);
        }
    });

    Ok(Json(SubmissionCreated {
        message: format!("{} submitted successfully", kind.display_name()),
        submission_id: submission.id().clone(),
        file_link: submission.file_link().clone(),
    }))
}

async fn read_form(
    kind: SubmissionKind,
    mut multipart: Multipart,
    connection: &DatabaseConnection,
) -> Result<(WriteSubmission<'_>, Option<Upload>)> {
    let mut write = WriteSubmission::new(kind, connection);
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name.eq("file") {
            let filename = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().map(str::to_owned);
            let data = field.bytes().await?;
            upload = Some(Upload {
                filename,
                content_type,
                data,
            });
            continue;
        }

        let value = field.text().await?;
        let value = value.trim();
        // empty fields stay unset and are reported as missing
        if value.is_empty() {
            continue;
        }

        match name.as_str() {
            "name" => {
                write.set_name(Some(value.to_owned()));
            }
            "branch" => {
                write.set_branch(Some(value.to_owned()));
            }
            "mobile" => {
                write.set_mobile(Some(value.to_owned()));
            }
            "subject" => {
                write.set_subject(Some(value.to_owned()));
            }
            "projectTitle" => {
                write.set_project_title(Some(value.to_owned()));
            }
            "estimatedPages" => {
                let pages = value.parse::<u32>().map_err(|_| {
                    ApplicationError::BadRequest(
                        "Estimated pages must be a positive number".to_owned(),
                    )
                })?;
                write.set_estimated_pages(Some(pages));
            }
            "deadline" => {
                let deadline = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                    ApplicationError::BadRequest("Deadline must be a valid date".to_owned())
                })?;
                write.set_deadline(Some(deadline));
            }
            "projectType" => {
                let project_type = ProjectType::from_str(value).map_err(|_| {
                    ApplicationError::BadRequest(
                        "Project type must be one of minor, major, mini or other".to_owned(),
                    )
                })?;
                write.set_project_type(Some(project_type));
            }
            _ => debug!("Ignoring unknown form field {}", name),
        }
    }

    Ok((write, upload))
}

#[derive(Serialize, Debug, Clone)]
pub struct SubmissionList {
    submissions: Vec<SubmissionView>,
}

async fn list_submissions(
    State(state): State<ApplicationState>,
    Extension(employee): Extension<Employee>,
    options: std::result::Result<Query<ListOptions>, QueryRejection>,
) -> Result<Json<SubmissionList>> {
    let Query(options) =
        options.map_err(|rejection| ApplicationError::BadRequest(rejection.body_text()))?;
    let submissions = list_for_employee(&employee, &options, state.connection())
        .await?
        .into_iter()
        .map(SubmissionView::from)
        .collect();

    Ok(Json(SubmissionList { submissions }))
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    Accept,
    Complete,
}

/// Any `employeeId` sent along is ignored, the acting employee is the session's.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    submission_id: Option<String>,
    action: StatusAction,
    charged_price: Option<f64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct StatusUpdated {
    message: &'static str,
    submission: SubmissionView,
}

async fn update_status(
    State(state): State<ApplicationState>,
    Extension(employee): Extension<Employee>,
    Json(data): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdated>> {
    let id = data
        .submission_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApplicationError::MissingField("Submission ID"))?;
    let id = Id::try_from(("submission", id))?;

    let (message, submission) = match data.action {
        StatusAction::Accept => (
            "Submission assigned and accepted successfully",
            AcceptSubmission::new(&id, employee.id(), state.connection()).await?,
        ),
        StatusAction::Complete => (
            "Submission marked as completed successfully",
            CompleteSubmission::new(&id, employee.id(), data.charged_price, state.connection())
                .await?,
        ),
    };

    Ok(Json(StatusUpdated {
        message,
        submission: submission.into(),
    }))
}
