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
use async_trait::async_trait;
use axum::body::Bytes;
use std::future::Future;
use std::time::Duration;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";
const STORAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// A file received from the submission form.
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn validate(&self, kind: SubmissionKind) -> Result<()> {
        if self.data.is_empty() {
            return Err(ApplicationError::MissingField("File"));
        }

        let is_pdf = match self.content_type.as_deref() {
            Some(PDF_CONTENT_TYPE) => true,
            None | Some(GENERIC_CONTENT_TYPE) => self.filename.to_lowercase().ends_with(".pdf"),
            Some(_) => false,
        };
        if !is_pdf {
            return Err(ApplicationError::InvalidFile(
                "Only PDF files are allowed".to_owned(),
            ));
        }

        if self.data.len() > kind.max_file_size() {
            let limit = match kind {
                SubmissionKind::Assignment => "15MB",
                SubmissionKind::ProjectAssistance => "4.5MB",
            };
            return Err(ApplicationError::InvalidFile(format!(
                "File size must be less than {limit}"
            )));
        }

        Ok(())
    }

    /// A collision free object name that keeps the readable part of the original name.
    pub fn object_name(&self) -> String {
        let readable = self
            .filename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();
        let readable = readable.trim_matches('.');

        if readable.is_empty() {
            format!("{}.pdf", nanoid::nanoid!(12))
        } else {
            format!("{}-{}", nanoid::nanoid!(12), readable)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub folder: String,
    pub name: String,
    pub link: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + std::fmt::Debug {
    async fn upload(&self, folder: &str, upload: &Upload) -> Result<StoredObject>;
    async fn delete(&self, object: &StoredObject) -> Result<()>;
}

/// Uploads the file and passes the stored object to `write`.
/// The object is removed again when `write` fails, so no file is left without a record.
pub async fn with_upload<T, F, Fut>(
    storage: &dyn ObjectStorage,
    folder: &str,
    upload: &Upload,
    write: F,
) -> Result<T>
where
    F: FnOnce(StoredObject) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let object = storage.upload(folder, upload).await?;

    match write(object.clone()).await {
        Ok(value) => Ok(value),
        Err(error) => {
            warn!("Removing {} after the write failed: {}", object.link, error);
            if let Err(cleanup) = storage.delete(&object).await {
                error!("Unable to remove orphaned upload {}: {}", object.link, cleanup);
            }

            Err(error)
        }
    }
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    #[serde(alias = "webViewLink")]
    link: String,
}

/// Object storage reached over HTTP, `PUT`/`DELETE {endpoint}/{folder}/{name}`.
#[derive(Clone, Debug)]
pub struct HttpStorage {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

fn unavailable(error: reqwest::Error) -> ApplicationError {
    ApplicationError::StorageUnavailable(error.to_string())
}

impl HttpStorage {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(STORAGE_TIMEOUT)
            .build()
            .map_err(unavailable)?;

        Ok(Self {
            client,
            endpoint: config.storage_endpoint.trim_end_matches('/').to_owned(),
            token: config.storage_token.clone(),
        })
    }

    fn url(&self, folder: &str, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, folder, name)
    }
}

#[async_trait]
impl ObjectStorage for HttpStorage {
    #[instrument(skip(self, upload))]
    async fn upload(&self, folder: &str, upload: &Upload) -> Result<StoredObject> {
        let name = upload.object_name();
        let response = self
            .client
            .put(self.url(folder, name.as_str()))
            .bearer_auth(self.token.as_str())
            .header(reqwest::header::CONTENT_TYPE, PDF_CONTENT_TYPE)
            .body(upload.data.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?;
        let body = response.json::<UploadResponse>().await.map_err(unavailable)?;
        info!("Uploaded {} bytes to {}", upload.data.len(), body.link);

        Ok(StoredObject {
            folder: folder.to_owned(),
            name,
            link: body.link,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, object: &StoredObject) -> Result<()> {
        self.client
            .delete(self.url(object.folder.as_str(), object.name.as_str()))
            .bearer_auth(self.token.as_str())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?;

        Ok(())
    }
}
