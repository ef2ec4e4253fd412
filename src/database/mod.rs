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

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
#[cfg(not(test))]
use version_compare::{Cmp, Version};

pub mod definitions;
pub mod id;

pub type DatabaseConnection = Surreal<Any>;

const MEMORY_ENDPOINT: &str = "mem://";

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection: DatabaseConnection,
    pub database: String,
    pub namespace: String,
}

cfg_if::cfg_if! {
    if #[cfg(test)] {
        // every test suite gets its own database
        fn target(_: &Config) -> (String, String) {
            ("test".to_owned(), nanoid::nanoid!())
        }
    } else {
        fn target(config: &Config) -> (String, String) {
            (
                config.surrealdb_namespace.clone(),
                config.surrealdb_database.clone(),
            )
        }
    }
}

#[instrument(skip_all)]
pub async fn connect(config: &Config) -> Result<ConnectionInfo> {
    // establish the connection
    let client = surrealdb::engine::any::connect(config.surrealdb_endpoint.as_str()).await?;
    info!(
        "Established connection to surrealdb at {}",
        config.surrealdb_endpoint
    );

    // the embedded engine has no users
    if !config.surrealdb_endpoint.starts_with(MEMORY_ENDPOINT) {
        client
            .signin(Root {
                username: config.surrealdb_username.as_str(),
                password: config.surrealdb_password.as_str(),
            })
            .await?;
        info!("Authenticated with surrealdb");
    }

    let (namespace, database) = target(config);
    client
        .use_ns(namespace.as_str())
        .use_db(database.as_str())
        .await?;

    // perform the migrations
    #[cfg(not(test))]
    migrate(&client, env!("CARGO_PKG_VERSION"), Vec::new()).await?;
    // execute the up queries
    client
        .query(include_str!("./up.surrealql"))
        .await?
        .check()?;
    info!("Initiated tables in {namespace}/{database}");

    Ok(ConnectionInfo {
        database,
        namespace,
        connection: client,
    })
}

/// Runs every migration newer than the last recorded version, up to the current one.
#[cfg(not(test))]
pub async fn migrate(
    client: &DatabaseConnection,
    current_version: &'static str,
    migrations: Vec<(&'static str, &'static str)>,
) -> Result<()> {
    // initiate the migration table and fetch possibly already existing records
    let mut responses = client
        .query(
            "DEFINE TABLE migration SCHEMALESS;
            DEFINE FIELD version     ON TABLE migration TYPE string;
            DEFINE FIELD created_at  ON TABLE migration TYPE datetime DEFAULT time::now();",
        )
        .query("SELECT version, created_at FROM migration ORDER BY created_at DESC LIMIT 1")
        .await?
        .check()?;
    // take the last as response, which contains the last migrated version
    let last = responses.take::<Option<String>>((1, "version"))?;

    let Some(last) = last else {
        // fresh database, nothing to migrate
        sql_span!(client
            .query("CREATE migration SET version = $version")
            .bind(("version", current_version))
            .await?
            .check()?);
        return Ok(());
    };

    let (Some(last), Some(current)) = (
        Version::from(last.as_str()),
        Version::from(current_version),
    ) else {
        warn!("Unable to compare migration versions {last} and {current_version}");
        return Ok(());
    };

    for (version, migration) in migrations {
        let Some(target) = Version::from(version) else {
            warn!("Skipping migration with invalid version {version}");
            continue;
        };

        if target.compare_to(&last, Cmp::Gt) && target.compare_to(&current, Cmp::Le) {
            info!("Executing surrealdb migration to {version}");
            // execute the migration query and mark it as done
            sql_span!(client
                .query(migration)
                .query("CREATE migration SET version = $version")
                .bind(("version", version))
                .await?
                .check()?);
        }
    }

    if last.compare_to(&current, Cmp::Lt) {
        sql_span!(client
            .query("CREATE migration SET version = $version")
            .bind(("version", current_version))
            .await?
            .check()?);
    }

    Ok(())
}

/// Runs a surrealdb request inside its own span, `?` inside converts into `ApplicationError`.
#[macro_export]
macro_rules! sql_span {
    ($expr: expr) => {
        $crate::sql_span!($expr, "query")
    };
    ($expr: expr, $title: expr) => {{
        use tracing::Instrument;

        let span = tracing::info_span!(concat!("Surrealdb Request: ", $title));
        async { Ok::<_, $crate::error::ApplicationError>($expr) }
            .instrument(span)
            .await?
    }};
}
