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

#[macro_use]
extern crate serde;
#[macro_use]
extern crate thiserror;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate serde_json;
#[macro_use]
extern crate rust_i18n;

i18n!("locales");

mod auth;
mod database;
mod error;
mod hook;
mod lifecycle;
mod routes;
mod server;
mod storage;
#[cfg(test)]
mod tests;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    server::init()
}

pub mod prelude {
    pub use crate::database::id::Id;
    pub use crate::database::{ConnectionInfo, DatabaseConnection};
    pub use crate::error::*;
    pub use crate::routes::extractor::Json;
    pub use crate::server::state::ApplicationState;
    pub use crate::server::Config;
    pub use crate::sql_span;
}
