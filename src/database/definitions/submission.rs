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

use crate::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use strum::{AsRefStr, Display, EnumString};

// 15 MiB
const ASSIGNMENT_FILE_LIMIT: usize = 15 * 1024 * 1024;
// 4.5 MiB
const PROJECT_FILE_LIMIT: usize = 9 * 512 * 1024;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SubmissionKind {
    Assignment,
    ProjectAssistance,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 2] = [Self::Assignment, Self::ProjectAssistance];

    /// The task capability an employee needs to see and accept this kind.
    pub fn task(&self) -> u32 {
        match self {
            Self::Assignment => 1,
            Self::ProjectAssistance => 2,
        }
    }

    pub fn from_task(task: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.task() == task)
    }

    pub fn max_file_size(&self) -> usize {
        match self {
            Self::Assignment => ASSIGNMENT_FILE_LIMIT,
            Self::ProjectAssistance => PROJECT_FILE_LIMIT,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::ProjectAssistance => "Projects",
        }
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Completed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProjectType {
    Minor,
    Major,
    Mini,
    Other,
}

/// The kind specific part of a submission, stored next to the common fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionDetails {
    #[serde(rename_all = "camelCase")]
    Assignment { subject: String, estimated_pages: u32 },
    #[serde(rename_all = "camelCase")]
    ProjectAssistance {
        project_title: String,
        project_type: ProjectType,
    },
}

impl SubmissionDetails {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Self::Assignment { .. } => SubmissionKind::Assignment,
            Self::ProjectAssistance { .. } => SubmissionKind::ProjectAssistance,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Submission {
    id: Id,
    #[serde(flatten)]
    details: SubmissionDetails,
    name: String,
    branch: String,
    mobile: String,
    deadline: NaiveDate,
    file_link: String,
    status: SubmissionStatus,
    assigned_to_id: Option<Id>,
    assigned_to: Option<String>,
    accepted_on: Option<DateTime<Utc>>,
    completed_on: Option<DateTime<Utc>>,
    charged_price: Option<f64>,
    created_at: DateTime<Utc>,
}

/// 10% of the charged price, rounded to cents.
pub fn platform_fee(charged_price: f64) -> f64 {
    (charged_price * 10.0).round() / 100.0
}

impl Submission {
    pub fn kind(&self) -> SubmissionKind {
        self.details.kind()
    }

    pub fn platform_fee(&self) -> Option<f64> {
        self.charged_price.map(platform_fee)
    }

    pub fn is_assigned_to(&self, employee: &Id) -> bool {
        self.assigned_to_id
            .as_ref()
            .is_some_and(|assignee| assignee.eq(employee))
    }

    #[instrument(skip(connection))]
    pub async fn fetch(id: &Id, connection: &DatabaseConnection) -> Result<Option<Submission>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM $submission")
                .bind(("submission", id.to_thing()))
                .await?
                .check()?
                .take(0)?,
            "fetch submission"
        ))
    }
}

/// A submission as rendered to employees, with the derived platform fee.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub platform_fee: Option<f64>,
}

impl From<Submission> for SubmissionView {
    fn from(submission: Submission) -> Self {
        Self {
            platform_fee: submission.platform_fee(),
            submission,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SubmissionRecord<'r> {
    #[serde(flatten)]
    details: SubmissionDetails,
    name: &'r str,
    branch: &'r str,
    mobile: &'r str,
    deadline: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_link: Option<&'r str>,
    status: SubmissionStatus,
}

#[derive(Clone, Debug, Setters)]
pub struct WriteSubmission<'a> {
    kind: SubmissionKind,
    #[set = "pub"]
    name: Option<String>,
    #[set = "pub"]
    branch: Option<String>,
    #[set = "pub"]
    mobile: Option<String>,
    #[set = "pub"]
    deadline: Option<NaiveDate>,
    #[set = "pub"]
    subject: Option<String>,
    #[set = "pub"]
    estimated_pages: Option<u32>,
    #[set = "pub"]
    project_title: Option<String>,
    #[set = "pub"]
    project_type: Option<ProjectType>,
    #[set = "pub"]
    file_link: Option<String>,
    connection: &'a DatabaseConnection,
}

fn required<'v>(value: &'v Option<String>, field: &'static str) -> Result<&'v str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApplicationError::MissingField(field))
}

impl<'a> WriteSubmission<'a> {
    pub fn new(kind: SubmissionKind, connection: &'a DatabaseConnection) -> Self {
        Self {
            kind,
            name: None,
            branch: None,
            mobile: None,
            deadline: None,
            subject: None,
            estimated_pages: None,
            project_title: None,
            project_type: None,
            file_link: None,
            connection,
        }
    }

    /// Checks every field except the file link, which only exists after the upload.
    pub fn validate(&self) -> Result<()> {
        self.record().map(|_| ())
    }

    fn record(&self) -> Result<SubmissionRecord<'_>> {
        let name = required(&self.name, "Name")?;
        let branch = required(&self.branch, "Branch")?;
        let mobile = required(&self.mobile, "Mobile number")?;
        if mobile.len() != 10 || !mobile.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApplicationError::BadRequest(
                "Mobile number must be exactly 10 digits".to_owned(),
            ));
        }

        let details = match self.kind {
            SubmissionKind::Assignment => {
                let estimated_pages = self
                    .estimated_pages
                    .ok_or(ApplicationError::MissingField("Estimated pages"))?;
                if estimated_pages == 0 {
                    return Err(ApplicationError::BadRequest(
                        "Estimated pages must be a positive number".to_owned(),
                    ));
                }

                SubmissionDetails::Assignment {
                    subject: required(&self.subject, "Subject")?.to_owned(),
                    estimated_pages,
                }
            }
            SubmissionKind::ProjectAssistance => SubmissionDetails::ProjectAssistance {
                project_title: required(&self.project_title, "Project title")?.to_owned(),
                project_type: self
                    .project_type
                    .ok_or(ApplicationError::MissingField("Project type"))?,
            },
        };
        let deadline = self
            .deadline
            .ok_or(ApplicationError::MissingField("Deadline"))?;

        Ok(SubmissionRecord {
            details,
            name,
            branch,
            mobile,
            deadline,
            file_link: None,
            status: SubmissionStatus::Pending,
        })
    }
}

impl<'a> IntoFuture for WriteSubmission<'a> {
    type Output = Result<Submission>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut record = self.record()?;
            record.file_link = Some(required(&self.file_link, "File")?);

            let id = Id::generate("submission");
            let submission: Option<Submission> = sql_span!(
                self.connection
                    .query("CREATE $submission CONTENT $data")
                    .bind(("submission", id.to_thing()))
                    .bind(("data", &record))
                    .await?
                    .check()?
                    .take(0)?,
                "create submission"
            );

            submission.ok_or(ApplicationError::InternalServerError)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::database::definitions::submission::{
        platform_fee, ProjectType, SubmissionDetails, SubmissionKind, SubmissionStatus,
        WriteSubmission,
    };
    use crate::error::ApplicationError;
    use crate::server::Config;
    use crate::tests::assignment;
    use axum::BoxError;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_write() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;

        let submission = assignment(&connection)
            .set_name(Some("  A  ".to_owned()))
            .to_owned()
            .await?;

        assert_eq!("A", submission.name().as_str());
        assert_eq!(SubmissionKind::Assignment, submission.kind());
        assert_eq!(SubmissionStatus::Pending, *submission.status());
        assert_eq!(
            &SubmissionDetails::Assignment {
                subject: "DS".to_owned(),
                estimated_pages: 10
            },
            submission.details()
        );
        assert!(submission.assigned_to_id().is_none());
        assert!(submission.accepted_on().is_none());
        assert!(submission.completed_on().is_none());
        assert!(submission.charged_price().is_none());
        assert!(submission.platform_fee().is_none());

        // the stored record reads back identically
        let fetched = crate::database::definitions::submission::Submission::fetch(
            submission.id(),
            &connection,
        )
        .await?;
        assert_eq!(Some(submission), fetched);

        Ok(())
    }

    #[tokio::test]
    async fn test_write_project() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;

        let submission = WriteSubmission::new(SubmissionKind::ProjectAssistance, &connection)
            .set_name(Some("B".to_owned()))
            .set_branch(Some("ECE".to_owned()))
            .set_mobile(Some("9876543210".to_owned()))
            .set_project_title(Some("Line follower".to_owned()))
            .set_project_type(Some(ProjectType::Mini))
            .set_deadline(NaiveDate::from_ymd_opt(2025, 12, 1))
            .set_file_link(Some("https://storage.test/projects/file.pdf".to_owned()))
            .to_owned()
            .await?;

        assert_eq!(SubmissionKind::ProjectAssistance, submission.kind());
        assert_eq!(
            &SubmissionDetails::ProjectAssistance {
                project_title: "Line follower".to_owned(),
                project_type: ProjectType::Mini
            },
            submission.details()
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_validation() -> Result<(), BoxError> {
        let connection = crate::database::connect(&Config::test()).await?.connection;

        let result = assignment(&connection).set_name(None).validate();
        assert!(matches!(result, Err(ApplicationError::MissingField("Name"))));

        let result = assignment(&connection)
            .set_branch(Some("   ".to_owned()))
            .validate();
        assert!(matches!(result, Err(ApplicationError::MissingField("Branch"))));

        let result = assignment(&connection)
            .set_mobile(Some("98765".to_owned()))
            .validate();
        assert!(matches!(result, Err(ApplicationError::BadRequest(_))));

        let result = assignment(&connection)
            .set_estimated_pages(Some(0))
            .validate();
        assert!(matches!(result, Err(ApplicationError::BadRequest(_))));

        let result = assignment(&connection).set_deadline(None).validate();
        assert!(matches!(
            result,
            Err(ApplicationError::MissingField("Deadline"))
        ));

        let result = WriteSubmission::new(SubmissionKind::ProjectAssistance, &connection)
            .set_name(Some("B".to_owned()))
            .set_branch(Some("ECE".to_owned()))
            .set_mobile(Some("9876543210".to_owned()))
            .set_project_title(Some("Line follower".to_owned()))
            .validate();
        assert!(matches!(
            result,
            Err(ApplicationError::MissingField("Project type"))
        ));

        // a complete form still needs the uploaded file
        let result = assignment(&connection).set_file_link(None).to_owned().await;
        assert!(matches!(result, Err(ApplicationError::MissingField("File"))));

        Ok(())
    }

    #[test]
    fn test_platform_fee() {
        assert_eq!(50.0, platform_fee(500.0));
        assert_eq!(12.35, platform_fee(123.45));
        assert_eq!(0.1, platform_fee(1.0));
    }

    #[test]
    fn test_kind() {
        assert_eq!(Some(SubmissionKind::Assignment), SubmissionKind::from_task(1));
        assert_eq!(
            Some(SubmissionKind::ProjectAssistance),
            SubmissionKind::from_task(2)
        );
        assert_eq!(None, SubmissionKind::from_task(3));
        assert_eq!(15 * 1024 * 1024, SubmissionKind::Assignment.max_file_size());
        assert_eq!(4_718_592, SubmissionKind::ProjectAssistance.max_file_size());
        assert_eq!(
            Ok(ProjectType::Major),
            "Major".parse::<ProjectType>()
        );
    }
}
