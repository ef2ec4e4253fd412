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
use crate::hook::mail::SmtpMailer;
use crate::prelude::*;
use crate::storage::HttpStorage;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod state;

/// Process wide settings, read once from the environment on startup.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub surrealdb_endpoint: String,
    #[serde(default)]
    pub surrealdb_username: String,
    #[serde(default)]
    pub surrealdb_password: String,
    #[serde(default = "default_namespace")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_database")]
    pub surrealdb_database: String,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_sender: String,
    #[serde(default = "default_locale")]
    pub mail_locale: String,
    pub portal_url: String,
    pub jwt_secret: String,
    pub root_admin_email: String,
    pub root_admin_password: String,
    pub notify_token: String,
    pub storage_endpoint: String,
    #[serde(default)]
    pub storage_token: String,
    pub assignment_folder: String,
    pub project_folder: String,
    /// Marks session cookies as `Secure`.
    #[serde(default)]
    pub production: bool,
    /// Maintenance mode.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_namespace() -> String {
    "production".to_owned()
}

fn default_database() -> String {
    "mujtasks".to_owned()
}

fn default_locale() -> String {
    "en".to_owned()
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// The storage folder uploads of the given kind land in.
    pub fn folder(&self, kind: SubmissionKind) -> &str {
        match kind {
            SubmissionKind::Assignment => self.assignment_folder.as_str(),
            SubmissionKind::ProjectAssistance => self.project_folder.as_str(),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn test() -> Self {
        Self {
            surrealdb_endpoint: "mem://".to_owned(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: default_namespace(),
            surrealdb_database: default_database(),
            smtp_host: "localhost".to_owned(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            mail_sender: "MujTasks <noreply@mujtasks.test>".to_owned(),
            mail_locale: default_locale(),
            portal_url: "https://mujtasks.test/employee".to_owned(),
            jwt_secret: "test secret".to_owned(),
            root_admin_email: "root@mujtasks.test".to_owned(),
            root_admin_password: "root password".to_owned(),
            notify_token: "notify token".to_owned(),
            storage_endpoint: "https://storage.test".to_owned(),
            storage_token: String::new(),
            assignment_folder: "assignments".to_owned(),
            project_folder: "projects".to_owned(),
            production: false,
            disabled: false,
            port: default_port(),
        }
    }
}

pub fn init() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = envy::from_env::<Config>()?;

    tokio::runtime::Runtime::new()?.block_on(async move {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer())
            .init();

        if config.disabled {
            warn!("Maintenance mode is active, all mutating endpoints are rejected");
        }

        let (axum_sender, axum_receiver) = kanal::unbounded_async::<()>();

        let info = crate::database::connect(&config).await?;
        let storage = HttpStorage::new(&config)?;
        let mailer = SmtpMailer::new(&config)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let state = ApplicationState::new(info, config, Arc::new(storage), Arc::new(mailer));

        let server = tokio::spawn(async move {
            let router = crate::routes::router(state)
                .layer(CompressionLayer::new().gzip(true))
                .layer(TraceLayer::new_for_http());
            info!("Listening on {}", addr);

            axum::Server::bind(&addr)
                .serve(router.into_make_service())
                .with_graceful_shutdown(async move {
                    axum_receiver.recv().await.ok();
                })
                .await
        });

        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(error) => {
                error!("Unable to listen for shutdown signal: {}", error);
            }
        }

        info!("Received shutdown signal... Shutting down...");
        // shutdown
        axum_sender.send(()).await?;
        server.await??;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
