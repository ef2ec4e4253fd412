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

use crate::auth::middleware::reject_when_disabled;
use crate::database::definitions::employee::Employee;
use crate::database::definitions::submission::SubmissionKind;
use crate::hook::mail::Notice;
use crate::prelude::*;
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::Router;
use serde_json::Value;

pub mod mail;

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyRequest {
    #[serde(rename = "type")]
    ty: Option<u32>,
    #[serde(rename = "TOKEN")]
    token: Option<String>,
}

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route(
            "/",
            post(notify).layer(from_fn_with_state(state.clone(), reject_when_disabled)),
        )
        .with_state(state)
}

pub async fn notify(
    State(state): State<ApplicationState>,
    Json(data): Json<NotifyRequest>,
) -> Result<Json<Value>> {
    let kind = data
        .ty
        .and_then(SubmissionKind::from_task)
        .ok_or_else(|| ApplicationError::BadRequest("Invalid or missing task type".to_owned()))?;
    // authorize the request
    authorize_request(data.token.as_deref(), state.config())?;

    let notified = notify_employees(&state, kind).await?;
    let message = if notified == 0 {
        "No employees found to notify"
    } else {
        "Notification sent successfully"
    };

    Ok(Json(json!({
        "message": message,
        "notified": notified
    })))
}

pub fn authorize_request(token: Option<&str>, config: &Config) -> Result<()> {
    match token {
        Some(token) if !config.notify_token.is_empty() && token.eq(&config.notify_token) => Ok(()),
        _ => Err(ApplicationError::unauthorized("Invalid notification token")),
    }
}

/// Mails every employee able to handle `kind`, returns how many were addressed.
#[instrument(skip(state))]
pub async fn notify_employees(state: &ApplicationState, kind: SubmissionKind) -> Result<usize> {
    let recipients = Employee::with_task(kind.task(), state.connection())
        .await?
        .into_iter()
        .map(|employee| employee.email().clone())
        .collect::<Vec<String>>();
    if recipients.is_empty() {
        warn!("No employees found to notify about a new {}", kind);
        return Ok(0);
    }

    let count = recipients.len();
    state
        .mailer()
        .broadcast(&Notice { kind, recipients })
        .await
        .map_err(|error| {
            error!("Unable to send the notification: {}", error);
            ApplicationError::Upstream("Failed to send notification email".to_owned())
        })?;

    Ok(count)
}
