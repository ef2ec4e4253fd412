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

use crate::auth::session::{expired_cookie, ADMIN_COOKIE};
use crate::database::definitions::employee::{is_valid_email, normalize_email};
use crate::prelude::*;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::CookieJar;

pub mod employee;
pub mod root;

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .nest("/employee", employee::router(state.clone()))
        .nest("/rootadmin", root::router(state))
        .route("/logout", get(logout).post(logout))
}

/// Clears the legacy admin session, which is never issued anymore.
async fn logout(jar: CookieJar) -> Result<(CookieJar, Json<Message>)> {
    if jar.get(ADMIN_COOKIE).is_none() {
        return Err(ApplicationError::unauthorized("Authentication required"));
    }

    Ok((end_session(jar, ADMIN_COOKIE), Json("Logout successful".into())))
}

/// Expires the named session cookie, a request without it gets no `Set-Cookie`.
pub fn end_session(jar: CookieJar, name: &'static str) -> CookieJar {
    match jar.get(name) {
        Some(_) => jar.remove(expired_cookie(name)),
        None => jar,
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

impl LoginRequest {
    /// The normalized email and the password, both present and well formed.
    pub fn credentials(&self) -> Result<(String, &str)> {
        let email = self.email.as_deref().map(normalize_email).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(ApplicationError::BadRequest(
                "Email and password are required".to_owned(),
            ));
        }
        if !is_valid_email(email.as_str()) {
            return Err(ApplicationError::BadRequest("Invalid email format".to_owned()));
        }

        Ok((email, password))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Message {
    message: &'static str,
}

impl From<&'static str> for Message {
    fn from(message: &'static str) -> Self {
        Self { message }
    }
}
