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

use crate::database::definitions::submission::SubmissionStatus;
use crate::prelude::*;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("API is disabled by owner")]
    Disabled,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidFile(String),
    #[error("Charged price must be greater than zero")]
    InvalidPrice,
    #[error("{0}")]
    Forbidden(String),
    #[error("Submission not found")]
    SubmissionNotFound,
    #[error("Employee not found")]
    EmployeeNotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("Submission is already {0}")]
    InvalidState(SubmissionStatus),
    #[error("Failed to upload file: {0}")]
    StorageUnavailable(String),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    SurrealdbError(#[from] surrealdb::Error),
    #[error(transparent)]
    SMTPError(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Internal error occurred")]
    InternalServerError,
}

pub type Result<T> = std::result::Result<T, ApplicationError>;

macro_rules! log_test_error {
    ($error:expr) => {
        #[cfg(test)]
        {
            println!("Err: {:?}", $error.to_string());
        }
    };
}

impl ApplicationError {
    pub fn unauthorized(message: &str) -> Self {
        Self::Unauthorized(message.to_owned())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::Disabled => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_)
            | Self::MissingField(_)
            | Self::InvalidFile(_)
            | Self::InvalidPrice => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SubmissionNotFound | Self::EmployeeNotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            // collaborator failures keep their message, the frontend shows it verbatim
            ApplicationError::StorageUnavailable(_) | ApplicationError::Upstream(_) => {
                error!("Err: {}", self.to_string());
                (status, Json(json!({ "error": self.to_string() })))
            }
            _ if status.is_server_error() => {
                error!("Err: {}", self.to_string());
                log_test_error!(self);

                (
                    status,
                    Json(json!({"error": "Error occurred while processing the request"})),
                )
            }
            _ => {
                log_test_error!(self);
                (status, Json(json!({ "error": self.to_string() })))
            }
        }
        .into_response()
    }
}

impl From<MultipartError> for ApplicationError {
    fn from(error: MultipartError) -> Self {
        Self::BadRequest(error.to_string())
    }
}
