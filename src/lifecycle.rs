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

use crate::database::definitions::employee::Employee;
use crate::database::definitions::submission::{Submission, SubmissionKind, SubmissionStatus};
use crate::prelude::*;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

/// Filters an employee may apply to their submission list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListOptions {
    pub kind: Option<SubmissionKind>,
    pub status: Option<SubmissionStatus>,
}

/// Every submission the employee may handle, newest first.
#[instrument(skip(employee, connection))]
pub async fn list_for_employee(
    employee: &Employee,
    options: &ListOptions,
    connection: &DatabaseConnection,
) -> Result<Vec<Submission>> {
    let kinds = match options.kind {
        Some(kind) if !employee.can_handle(kind) => {
            return Err(ApplicationError::Forbidden(format!(
                "You are not allowed to view {} requests",
                kind.display_name()
            )))
        }
        Some(kind) => vec![kind],
        None => employee.kinds(),
    };
    if kinds.is_empty() {
        return Ok(Vec::new());
    }

    let query = match options.status {
        Some(_) => "SELECT * FROM submission WHERE kind INSIDE $kinds AND status = $status ORDER BY createdAt DESC",
        None => "SELECT * FROM submission WHERE kind INSIDE $kinds ORDER BY createdAt DESC",
    };

    Ok(sql_span!(
        connection
            .query(query)
            .bind(("kinds", kinds))
            .bind(("status", options.status))
            .await?
            .check()?
            .take(0)?,
        "list submissions"
    ))
}

/// Claims a pending submission for the acting employee.
#[derive(Clone, Debug)]
pub struct AcceptSubmission<'a> {
    submission: &'a Id,
    employee: &'a Id,
    connection: &'a DatabaseConnection,
}

impl<'a> AcceptSubmission<'a> {
    pub fn new(submission: &'a Id, employee: &'a Id, connection: &'a DatabaseConnection) -> Self {
        Self {
            submission,
            employee,
            connection,
        }
    }
}

impl<'a> IntoFuture for AcceptSubmission<'a> {
    type Output = Result<Submission>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let submission = Submission::fetch(self.submission, self.connection)
                .await?
                .ok_or(ApplicationError::SubmissionNotFound)?;
            let employee = Employee::fetch(self.employee, self.connection)
                .await?
                .ok_or(ApplicationError::EmployeeNotFound)?;

            if *submission.status() != SubmissionStatus::Pending {
                return Err(ApplicationError::InvalidState(*submission.status()));
            }
            if !employee.can_handle(submission.kind()) {
                return Err(ApplicationError::Forbidden(format!(
                    "You are not allowed to accept {} requests",
                    submission.kind().display_name()
                )));
            }

            // compare and swap on the status, a concurrent accept matches nothing
            let accepted: Option<Submission> = sql_span!(
                self.connection
                    .query(
                        "UPDATE submission SET
                            status = $accepted,
                            assignedToId = $employee,
                            assignedTo = $name,
                            acceptedOn = time::now()
                        WHERE id = $submission AND status = $pending
                        RETURN AFTER",
                    )
                    .bind(("submission", self.submission.to_thing()))
                    .bind(("employee", employee.id()))
                    .bind(("name", employee.name()))
                    .bind(("accepted", SubmissionStatus::Accepted))
                    .bind(("pending", SubmissionStatus::Pending))
                    .await?
                    .check()?
                    .take(0)?,
                "accept submission"
            );

            match accepted {
                Some(submission) => {
                    info!("Submission {} accepted by {}", submission.id(), employee.id());
                    Ok(submission)
                }
                None => {
                    let current = Submission::fetch(self.submission, self.connection)
                        .await?
                        .ok_or(ApplicationError::SubmissionNotFound)?;
                    warn!(
                        "Lost the race to accept {}, it is now {}",
                        current.id(),
                        current.status()
                    );

                    Err(ApplicationError::InvalidState(*current.status()))
                }
            }
        })
    }
}

/// Marks an accepted submission as done and records the charged price.
#[derive(Clone, Debug)]
pub struct CompleteSubmission<'a> {
    submission: &'a Id,
    employee: &'a Id,
    charged_price: Option<f64>,
    connection: &'a DatabaseConnection,
}

impl<'a> CompleteSubmission<'a> {
    pub fn new(
        submission: &'a Id,
        employee: &'a Id,
        charged_price: Option<f64>,
        connection: &'a DatabaseConnection,
    ) -> Self {
        Self {
            submission,
            employee,
            charged_price,
            connection,
        }
    }
}

impl<'a> IntoFuture for CompleteSubmission<'a> {
    type Output = Result<Submission>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let submission = Submission::fetch(self.submission, self.connection)
                .await?
                .ok_or(ApplicationError::SubmissionNotFound)?;

            // ownership is checked before anything about the price
            if !submission.is_assigned_to(self.employee) {
                return Err(ApplicationError::Forbidden(
                    "You can only complete submissions assigned to you".to_owned(),
                ));
            }
            let charged_price = self
                .charged_price
                .filter(|price| price.is_finite() && *price > 0.0)
                .ok_or(ApplicationError::InvalidPrice)?;
            if *submission.status() != SubmissionStatus::Accepted {
                return Err(ApplicationError::InvalidState(*submission.status()));
            }

            let completed: Option<Submission> = sql_span!(
                self.connection
                    .query(
                        "UPDATE submission SET
                            status = $completed,
                            chargedPrice = $price,
                            completedOn = time::now()
                        WHERE id = $submission AND status = $accepted AND assignedToId = $employee
                        RETURN AFTER",
                    )
                    .bind(("submission", self.submission.to_thing()))
                    .bind(("employee", self.employee))
                    .bind(("price", charged_price))
                    .bind(("completed", SubmissionStatus::Completed))
                    .bind(("accepted", SubmissionStatus::Accepted))
                    .await?
                    .check()?
                    .take(0)?,
                "complete submission"
            );

            match completed {
                Some(submission) => {
                    info!(
                        "Submission {} completed by {} for {}",
                        submission.id(),
                        self.employee,
                        charged_price
                    );
                    Ok(submission)
                }
                None => {
                    let current = Submission::fetch(self.submission, self.connection)
                        .await?
                        .ok_or(ApplicationError::SubmissionNotFound)?;

                    Err(ApplicationError::InvalidState(*current.status()))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::database::definitions::employee::Employee;
    use crate::database::definitions::submission::{SubmissionKind, SubmissionStatus};
    use crate::database::id::Id;
    use crate::error::ApplicationError;
    use crate::lifecycle::{list_for_employee, AcceptSubmission, CompleteSubmission, ListOptions};
    use crate::server::Config;
    use crate::tests::{assignment, employee, project};
    use axum::BoxError;
    use std::future::IntoFuture;

    #[tokio::test]
    async fn test_accept() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let first = employee(&connection, "first@example.com", vec![1]).await?;
        let second = employee(&connection, "second@example.com", vec![1]).await?;
        let submission = assignment(&connection).to_owned().await?;

        let accepted = AcceptSubmission::new(submission.id(), first.id(), &connection).await?;
        assert_eq!(SubmissionStatus::Accepted, *accepted.status());
        assert_eq!(Some(first.id()), accepted.assigned_to_id().as_ref());
        assert_eq!(Some(first.name()), accepted.assigned_to().as_ref());
        assert!(accepted.accepted_on().is_some());
        assert!(accepted.completed_on().is_none());
        assert_eq!(submission.created_at(), accepted.created_at());

        // a second employee can not take it over
        let result = AcceptSubmission::new(submission.id(), second.id(), &connection).await;
        assert!(matches!(
            result,
            Err(ApplicationError::InvalidState(SubmissionStatus::Accepted))
        ));
        let current = crate::database::definitions::submission::Submission::fetch(
            submission.id(),
            &connection,
        )
        .await?
        .ok_or("missing submission")?;
        assert_eq!(accepted, current);

        Ok(())
    }

    #[tokio::test]
    async fn test_accept_errors() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let writer = employee(&connection, "writer@example.com", vec![1]).await?;
        let builder = employee(&connection, "builder@example.com", vec![2]).await?;
        let submission = assignment(&connection).to_owned().await?;

        let result = AcceptSubmission::new(
            &Id::new(("submission", "missing")),
            writer.id(),
            &connection,
        )
        .await;
        assert!(matches!(result, Err(ApplicationError::SubmissionNotFound)));

        let result = AcceptSubmission::new(
            submission.id(),
            &Id::new(("employee", "missing")),
            &connection,
        )
        .await;
        assert!(matches!(result, Err(ApplicationError::EmployeeNotFound)));

        let result = AcceptSubmission::new(submission.id(), builder.id(), &connection).await;
        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_accept() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let first = employee(&connection, "first@example.com", vec![1]).await?;
        let second = employee(&connection, "second@example.com", vec![1]).await?;
        let submission = assignment(&connection).to_owned().await?;

        let (left, right) = tokio::join!(
            AcceptSubmission::new(submission.id(), first.id(), &connection).into_future(),
            AcceptSubmission::new(submission.id(), second.id(), &connection).into_future()
        );
        assert_eq!(1, [left.is_ok(), right.is_ok()].iter().filter(|ok| **ok).count());

        let winner = left.or(right)?;
        let current = crate::database::definitions::submission::Submission::fetch(
            submission.id(),
            &connection,
        )
        .await?
        .ok_or("missing submission")?;
        assert_eq!(winner.assigned_to_id(), current.assigned_to_id());

        Ok(())
    }

    #[tokio::test]
    async fn test_complete() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let first = employee(&connection, "first@example.com", vec![1]).await?;
        let second = employee(&connection, "second@example.com", vec![1]).await?;
        let submission = assignment(&connection).to_owned().await?;

        // nothing to complete before it was accepted
        let result =
            CompleteSubmission::new(submission.id(), first.id(), Some(500.0), &connection).await;
        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));

        AcceptSubmission::new(submission.id(), first.id(), &connection).await?;

        // ownership wins over the price validation
        let result =
            CompleteSubmission::new(submission.id(), second.id(), Some(-1.0), &connection).await;
        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));

        for price in [None, Some(0.0), Some(-5.0), Some(f64::NAN)] {
            let result =
                CompleteSubmission::new(submission.id(), first.id(), price, &connection).await;
            assert!(matches!(result, Err(ApplicationError::InvalidPrice)));
        }
        let current = crate::database::definitions::submission::Submission::fetch(
            submission.id(),
            &connection,
        )
        .await?
        .ok_or("missing submission")?;
        assert_eq!(SubmissionStatus::Accepted, *current.status());

        let completed =
            CompleteSubmission::new(submission.id(), first.id(), Some(500.0), &connection).await?;
        assert_eq!(SubmissionStatus::Completed, *completed.status());
        assert_eq!(Some(500.0), *completed.charged_price());
        assert_eq!(Some(50.0), completed.platform_fee());
        assert!(completed.completed_on().is_some());
        assert_eq!(current.accepted_on(), completed.accepted_on());

        // completed is terminal
        let result =
            CompleteSubmission::new(submission.id(), first.id(), Some(700.0), &connection).await;
        assert!(matches!(
            result,
            Err(ApplicationError::InvalidState(SubmissionStatus::Completed))
        ));
        let result = AcceptSubmission::new(submission.id(), first.id(), &connection).await;
        assert!(matches!(
            result,
            Err(ApplicationError::InvalidState(SubmissionStatus::Completed))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_list() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let writer = employee(&connection, "writer@example.com", vec![1]).await?;
        let both = employee(&connection, "both@example.com", vec![1, 2]).await?;
        let nobody = employee(&connection, "nobody@example.com", vec![9]).await?;

        let older = assignment(&connection).to_owned().await?;
        let newer = assignment(&connection)
            .set_subject(Some("OS".to_owned()))
            .to_owned()
            .await?;
        let synopsis = project(&connection).to_owned().await?;

        let listed = list_for_employee(&writer, &ListOptions::default(), &connection).await?;
        assert_eq!(2, listed.len());
        assert!(listed
            .iter()
            .all(|submission| submission.kind() == SubmissionKind::Assignment));
        assert!(listed
            .iter()
            .all(|submission| *submission.status() == SubmissionStatus::Pending));
        assert!(listed[0].created_at() >= listed[1].created_at());
        assert!(listed.iter().any(|submission| submission.id() == older.id()));
        assert!(listed.iter().any(|submission| submission.id() == newer.id()));

        let listed = list_for_employee(&both, &ListOptions::default(), &connection).await?;
        assert_eq!(3, listed.len());
        assert!(listed.iter().any(|submission| submission.id() == synopsis.id()));

        let projects = ListOptions {
            kind: Some(SubmissionKind::ProjectAssistance),
            status: None,
        };
        let listed = list_for_employee(&both, &projects, &connection).await?;
        assert_eq!(1, listed.len());
        let result = list_for_employee(&writer, &projects, &connection).await;
        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));

        AcceptSubmission::new(newer.id(), writer.id(), &connection).await?;
        let accepted = ListOptions {
            kind: None,
            status: Some(SubmissionStatus::Accepted),
        };
        let listed = list_for_employee(&both, &accepted, &connection).await?;
        assert_eq!(1, listed.len());
        assert_eq!(newer.id(), listed[0].id());

        assert!(list_for_employee(&nobody, &ListOptions::default(), &connection)
            .await?
            .is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_dangling_assignee() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let writer = employee(&connection, "writer@example.com", vec![1]).await?;
        let submission = assignment(&connection).to_owned().await?;
        AcceptSubmission::new(submission.id(), writer.id(), &connection).await?;

        writer.fire(&connection).await?;
        assert!(Employee::fetch(writer.id(), &connection).await?.is_none());

        let current = crate::database::definitions::submission::Submission::fetch(
            submission.id(),
            &connection,
        )
        .await?
        .ok_or("missing submission")?;
        assert_eq!(Some(writer.id()), current.assigned_to_id().as_ref());

        Ok(())
    }

    #[tokio::test]
    async fn test_created_at_is_kept() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;
        let writer = employee(&connection, "writer@example.com", vec![1]).await?;
        let submission = assignment(&connection).to_owned().await?;

        let accepted = AcceptSubmission::new(submission.id(), writer.id(), &connection).await?;
        assert_eq!(submission.created_at(), accepted.created_at());

        let completed =
            CompleteSubmission::new(submission.id(), writer.id(), Some(500.0), &connection)
                .await?;
        assert_eq!(submission.created_at(), completed.created_at());
        assert_eq!(Some(500.0), *completed.charged_price());

        // the record can not be backdated either
        let result = connection
            .query("UPDATE $submission SET createdAt = time::now() - 1w")
            .bind(("submission", submission.id().to_thing()))
            .await?
            .check();
        assert!(result.is_err());

        Ok(())
    }
}
