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

use crate::auth::session::{session_cookie, Principal};
use crate::database::definitions::employee::{normalize_email, Employee};
use crate::prelude::*;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum_extra::extract::cookie::Cookie;

pub mod middleware;
pub mod session;

pub trait Authenticate {
    fn login(&self, password: &str) -> Result<()>;
    fn principal(&self) -> Principal;

    /// Signs a session and packs it into the principal's cookie.
    fn start_session(&self, config: &Config) -> Result<Cookie<'static>> {
        let principal = self.principal();
        let token = principal.issue(config)?;

        Ok(session_cookie(principal.cookie_name(), token, config))
    }
}

impl Authenticate for Employee {
    #[instrument(skip_all)]
    fn login(&self, password: &str) -> Result<()> {
        let hash = PasswordHash::new(self.password().as_str()).map_err(|error| {
            error!("Stored password of {} is not a valid hash: {}", self.id(), error);
            ApplicationError::InternalServerError
        })?;

        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| ApplicationError::unauthorized("Invalid credentials"))
    }

    fn principal(&self) -> Principal {
        Principal::Employee(self.id().clone())
    }
}

/// The single root administrator, configured through the environment.
#[derive(Debug)]
pub struct RootAdmin<'a> {
    config: &'a Config,
}

impl<'a> RootAdmin<'a> {
    pub fn from_email(email: &str, config: &'a Config) -> Option<Self> {
        normalize_email(email)
            .eq(&normalize_email(config.root_admin_email.as_str()))
            .then_some(Self { config })
    }
}

impl Authenticate for RootAdmin<'_> {
    fn login(&self, password: &str) -> Result<()> {
        if !self.config.root_admin_password.is_empty()
            && self.config.root_admin_password.as_str().eq(password)
        {
            Ok(())
        } else {
            Err(ApplicationError::unauthorized("Invalid credentials"))
        }
    }

    fn principal(&self) -> Principal {
        Principal::RootAdmin
    }
}
