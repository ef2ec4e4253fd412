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

use crate::database::definitions::submission::SubmissionKind;
use crate::prelude::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use lazy_static::lazy_static;
use regex::Regex;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("the email pattern is valid");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Human readable label of a task capability.
pub fn task_display_name(task: u32) -> String {
    match SubmissionKind::from_task(task) {
        Some(kind) => kind.display_name().to_owned(),
        None => format!("Unknown Task ({task})"),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskCapability {
    pub id: u32,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Getters)]
#[get = "pub"]
pub struct Employee {
    id: Id,
    name: String,
    email: String,
    mobile: String,
    // the hash never leaves the server
    #[serde(skip_serializing, default)]
    password: String,
    #[serde(default)]
    task: Vec<u32>,
}

impl Employee {
    pub fn can_handle(&self, kind: SubmissionKind) -> bool {
        self.task.contains(&kind.task())
    }

    /// The submission kinds this employee is allowed to see.
    pub fn kinds(&self) -> Vec<SubmissionKind> {
        SubmissionKind::ALL
            .into_iter()
            .filter(|kind| self.can_handle(*kind))
            .collect()
    }

    pub fn capabilities(&self) -> Vec<TaskCapability> {
        self.task
            .iter()
            .map(|task| TaskCapability {
                id: *task,
                name: task_display_name(*task),
            })
            .collect()
    }

    #[instrument(skip(connection))]
    pub async fn fetch(id: &Id, connection: &DatabaseConnection) -> Result<Option<Employee>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM $employee")
                .bind(("employee", id.to_thing()))
                .await?
                .check()?
                .take(0)?,
            "fetch employee"
        ))
    }

    #[instrument(skip(connection))]
    pub async fn from_email(
        email: &str,
        connection: &DatabaseConnection,
    ) -> Result<Option<Employee>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM employee WHERE email = $email LIMIT 1")
                .bind(("email", normalize_email(email)))
                .await?
                .check()?
                .take(0)?,
            "fetch employee by email"
        ))
    }

    #[instrument(skip_all)]
    pub async fn all(connection: &DatabaseConnection) -> Result<Vec<Employee>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM employee ORDER BY createdAt ASC")
                .await?
                .check()?
                .take(0)?,
            "list employees"
        ))
    }

    #[instrument(skip(connection))]
    pub async fn with_task(task: u32, connection: &DatabaseConnection) -> Result<Vec<Employee>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM employee WHERE task CONTAINS $task")
                .bind(("task", task))
                .await?
                .check()?
                .take(0)?,
            "list employees by task"
        ))
    }

    /// Hard deletes the employee. Submissions keep their `assignedToId`.
    #[instrument(skip_all)]
    pub async fn fire(&self, connection: &DatabaseConnection) -> Result<()> {
        sql_span!(connection
            .query("DELETE $employee")
            .bind(("employee", self.id.to_thing()))
            .await?
            .check()?);

        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct EmployeeRecord<'r> {
    name: &'r str,
    email: String,
    mobile: &'r str,
    password: String,
    task: Vec<u32>,
}

#[derive(Clone, Debug, Setters)]
pub struct WriteEmployee<'a> {
    #[set = "pub"]
    name: Option<String>,
    #[set = "pub"]
    email: Option<String>,
    #[set = "pub"]
    mobile: Option<String>,
    #[set = "pub"]
    password: Option<String>,
    #[set = "pub"]
    task: Option<Vec<u32>>,
    #[set = "pub"]
    target: Option<&'a Employee>,
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteEmployee<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            name: None,
            email: None,
            mobile: None,
            password: None,
            task: None,
            target: None,
            connection,
        }
    }
}

fn conflict_on_duplicate(error: surrealdb::Error) -> ApplicationError {
    // the unique index is the last line of defense against concurrent writers
    if error.to_string().contains("already contains") {
        ApplicationError::Conflict("Employee with this email already exists".to_owned())
    } else {
        error.into()
    }
}

impl<'a> WriteEmployee<'a> {
    fn record(&self) -> Result<EmployeeRecord<'_>> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        let email = self.email.as_deref().map(normalize_email).unwrap_or_default();
        let mobile = self.mobile.as_deref().map(str::trim).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();

        if name.is_empty() || email.is_empty() || mobile.is_empty() || password.is_empty() {
            return Err(ApplicationError::BadRequest(
                "All fields (name, email, mobile, password) are required".to_owned(),
            ));
        }

        let length = password.chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
            return Err(ApplicationError::BadRequest(format!(
                "Password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters long"
            )));
        }

        if !is_valid_email(email.as_str()) {
            return Err(ApplicationError::BadRequest(
                "Please provide a valid email address".to_owned(),
            ));
        }

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
            .map_err(|error| {
                error!("Unable to hash password: {}", error);
                ApplicationError::InternalServerError
            })?
            .to_string();

        // the capabilities are a set
        let mut task = self.task.clone().unwrap_or_default();
        task.sort_unstable();
        task.dedup();

        Ok(EmployeeRecord {
            name,
            email,
            mobile,
            password: hash,
            task,
        })
    }
}

impl<'a> IntoFuture for WriteEmployee<'a> {
    type Output = Result<Employee>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let record = self.record()?;

            // the email is unique regardless of its casing, the record itself is excluded
            if let Some(existing) =
                Employee::from_email(record.email.as_str(), self.connection).await?
            {
                if self.target.map_or(true, |target| target.id.ne(&existing.id)) {
                    return Err(ApplicationError::Conflict(
                        "Employee with this email already exists".to_owned(),
                    ));
                }
            }

            let employee: Option<Employee> = if let Some(target) = self.target {
                sql_span!(
                    self.connection
                        .query("UPDATE employee MERGE $data WHERE id = $employee RETURN AFTER")
                        .bind(("employee", target.id.to_thing()))
                        .bind(("data", &record))
                        .await
                        .and_then(|response| response.check())
                        .map_err(conflict_on_duplicate)?
                        .take(0)?,
                    "update employee"
                )
            } else {
                sql_span!(
                    self.connection
                        .query("CREATE $employee CONTENT $data")
                        .bind(("employee", Id::generate("employee").to_thing()))
                        .bind(("data", &record))
                        .await
                        .and_then(|response| response.check())
                        .map_err(conflict_on_duplicate)?
                        .take(0)?,
                    "create employee"
                )
            };

            employee.ok_or(ApplicationError::EmployeeNotFound)
        })
    }
}
