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
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::{Debug, Formatter};

/// A broadcast about a freshly submitted request.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub kind: SubmissionKind,
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    async fn broadcast(&self, notice: &Notice) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    locale: String,
    portal_url: String,
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("sender", &self.sender)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(config.smtp_host.as_str())?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();
        let sender = config.mail_sender.parse::<Mailbox>().map_err(|error| {
            ApplicationError::Upstream(format!("Invalid mail sender address: {error}"))
        })?;

        Ok(Self {
            transport,
            sender,
            locale: config.mail_locale.clone(),
            portal_url: config.portal_url.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all)]
    async fn broadcast(&self, notice: &Notice) -> Result<()> {
        let kind = notice.kind.display_name();
        // the recipients only see the sender, never each other
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(self.sender.clone())
            .subject(t!(
                "mail.new_submission.title",
                locale = self.locale.as_str(),
                kind = kind
            ));
        for recipient in &notice.recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => builder = builder.bcc(mailbox),
                Err(error) => warn!("Skipping invalid recipient {}: {}", recipient, error),
            }
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(t!(
                "mail.new_submission.body",
                locale = self.locale.as_str(),
                kind = kind,
                portal = self.portal_url.as_str()
            ))
            .map_err(|error| ApplicationError::Upstream(error.to_string()))?;

        self.transport.send(message).await?;
        info!(
            "Notified {} employees about a new {}",
            notice.recipients.len(),
            kind
        );

        Ok(())
    }
}
