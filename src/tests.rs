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

use crate::auth::session::{Principal, EMPLOYEE_COOKIE, ROOT_ADMIN_COOKIE};
use crate::database::definitions::employee::{Employee, WriteEmployee};
use crate::database::definitions::submission::{ProjectType, SubmissionKind, WriteSubmission};
use crate::hook::mail::{Mailer, Notice};
use crate::prelude::{ApplicationError, ApplicationState, Config, DatabaseConnection};
use crate::storage::memory::MemoryStorage;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::{BoxError, Router};
use axum_test_helper::TestClient;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BOUNDARY: &str = "mujtasks-test-boundary";

#[derive(Getters)]
#[get = "pub"]
pub struct TestSuite {
    client: TestClient,
    router: Router,
    state: ApplicationState,
    storage: Arc<MemoryStorage>,
    mailer: Arc<RecordingMailer>,
}

/// A response read to the end.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestSuite {
    pub async fn init() -> Result<Self, BoxError> {
        Self::with_config(Config::test()).await
    }

    pub async fn with_config(config: Config) -> Result<Self, BoxError> {
        let info = crate::database::connect(&config).await?;
        let storage = Arc::new(MemoryStorage::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = ApplicationState::new(info, config, storage.clone(), mailer.clone());
        let router = crate::routes::router(state.clone());
        let client = TestClient::new(router.clone());

        Ok(Self {
            client,
            router,
            state,
            storage,
            mailer,
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.state.connection()
    }

    pub fn config(&self) -> &Config {
        self.state.config()
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Reply, BoxError> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = hyper::body::to_bytes(response.into_body()).await?;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };

        Ok(Reply {
            status,
            headers,
            json,
        })
    }

    /// Logs in through the api and returns the session as a `Cookie` header value.
    pub async fn login_employee(&self, email: &str, password: &str) -> Result<String, BoxError> {
        let reply = self
            .send(request(
                Method::POST,
                "/auth/employee/login",
                None,
                Some(json!({ "email": email, "password": password })),
            ))
            .await?;

        session_from(&reply, EMPLOYEE_COOKIE)
    }

    pub async fn login_root(&self) -> Result<String, BoxError> {
        let reply = self
            .send(request(
                Method::POST,
                "/auth/rootadmin/login",
                None,
                Some(json!({
                    "email": self.config().root_admin_email,
                    "password": self.config().root_admin_password
                })),
            ))
            .await?;

        session_from(&reply, ROOT_ADMIN_COOKIE)
    }

    /// Signs a session directly, for suites where the login route is unavailable.
    pub async fn session_for(&self, email: &str) -> Result<String, BoxError> {
        let employee = Employee::from_email(email, self.connection())
            .await?
            .ok_or(ApplicationError::EmployeeNotFound)?;
        let token = Principal::Employee(employee.id().clone()).issue(self.config())?;

        Ok(format!("{EMPLOYEE_COOKIE}={token}"))
    }

    pub fn session_for_root(&self) -> Result<String, BoxError> {
        let token = Principal::RootAdmin.issue(self.config())?;

        Ok(format!("{ROOT_ADMIN_COOKIE}={token}"))
    }
}

fn session_from(reply: &Reply, name: &str) -> Result<String, BoxError> {
    reply
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(name))
        .map(str::to_owned)
        .ok_or_else(|| format!("login failed with {}: {}", reply.status, reply.json).into())
}

pub fn request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }

    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap()
}

/// A hand built `multipart/form-data` body.
#[derive(Default, Debug, Clone)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(&data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Keeps every broadcast instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    notices: Mutex<Vec<Notice>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn broadcast(&self, notice: &Notice) -> crate::prelude::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApplicationError::Upstream("smtp is down".to_owned()));
        }

        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// An employee with the password `password`.
pub async fn employee(
    connection: &DatabaseConnection,
    email: &str,
    task: Vec<u32>,
) -> Result<Employee, BoxError> {
    let name = email.split('@').next().unwrap_or(email).to_owned();

    Ok(WriteEmployee::from(connection)
        .set_name(Some(name))
        .set_email(Some(email.to_owned()))
        .set_mobile(Some("9876543210".to_owned()))
        .set_password(Some("password".to_owned()))
        .set_task(Some(task))
        .to_owned()
        .await?)
}

pub fn assignment(connection: &DatabaseConnection) -> WriteSubmission<'_> {
    WriteSubmission::new(SubmissionKind::Assignment, connection)
        .set_name(Some("A".to_owned()))
        .set_branch(Some("CSE".to_owned()))
        .set_mobile(Some("9876543210".to_owned()))
        .set_estimated_pages(Some(10))
        .set_subject(Some("DS".to_owned()))
        .set_deadline(NaiveDate::from_ymd_opt(2025, 12, 1))
        .set_file_link(Some(
            "https://storage.test/assignments/valid.pdf".to_owned(),
        ))
        .to_owned()
}

pub fn project(connection: &DatabaseConnection) -> WriteSubmission<'_> {
    WriteSubmission::new(SubmissionKind::ProjectAssistance, connection)
        .set_name(Some("B".to_owned()))
        .set_branch(Some("ECE".to_owned()))
        .set_mobile(Some("9876543210".to_owned()))
        .set_project_title(Some("Line follower".to_owned()))
        .set_project_type(Some(ProjectType::Major))
        .set_deadline(NaiveDate::from_ymd_opt(2025, 11, 15))
        .set_file_link(Some("https://storage.test/projects/synopsis.pdf".to_owned()))
        .to_owned()
}
