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
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

pub const EMPLOYEE_COOKIE: &str = "employeeToken";
pub const ROOT_ADMIN_COOKIE: &str = "rootAdminToken";
pub const ADMIN_COOKIE: &str = "adminToken";

// 24h
const EMPLOYEE_SESSION_LENGTH: i64 = 24;
// 30d
const ROOT_ADMIN_SESSION_LENGTH: i64 = 30 * 24;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PrincipalKind {
    Employee,
    RootAdmin,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    sub: String,
    kind: PrincipalKind,
    iat: i64,
    exp: i64,
}

/// The authenticated identity behind a request.
#[derive(Clone, Debug, PartialEq)]
pub enum Principal {
    Employee(Id),
    RootAdmin,
    /// Never issued by this service, guards reject it.
    Admin,
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::Employee(_) => PrincipalKind::Employee,
            Self::RootAdmin => PrincipalKind::RootAdmin,
            Self::Admin => PrincipalKind::Admin,
        }
    }

    pub fn cookie_name(&self) -> &'static str {
        match self {
            Self::Employee(_) => EMPLOYEE_COOKIE,
            Self::RootAdmin => ROOT_ADMIN_COOKIE,
            Self::Admin => ADMIN_COOKIE,
        }
    }

    fn session_length(&self) -> Duration {
        match self {
            Self::RootAdmin => Duration::hours(ROOT_ADMIN_SESSION_LENGTH),
            _ => Duration::hours(EMPLOYEE_SESSION_LENGTH),
        }
    }

    fn subject(&self) -> String {
        match self {
            Self::Employee(id) => id.to_string(),
            Self::RootAdmin => "rootAdmin".to_owned(),
            Self::Admin => "admin".to_owned(),
        }
    }

    /// Signs a new session token for this principal.
    #[instrument(skip(config))]
    pub fn issue(&self, config: &Config) -> Result<String> {
        let iat = Utc::now();
        let claims = Claims {
            sub: self.subject(),
            kind: self.kind(),
            iat: iat.timestamp(),
            exp: (iat + self.session_length()).timestamp(),
        };

        encode(&claims, config)
    }

    #[instrument(skip_all)]
    pub fn verify(token: &str, config: &Config) -> Result<Principal> {
        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|error| match error.kind() {
            ErrorKind::ExpiredSignature => ApplicationError::unauthorized("Token expired"),
            _ => ApplicationError::unauthorized("Invalid token"),
        })?
        .claims;

        match claims.kind {
            PrincipalKind::Employee => Id::try_from(("employee", claims.sub.as_str()))
                .map(Principal::Employee)
                .map_err(|_| ApplicationError::unauthorized("Invalid token")),
            PrincipalKind::RootAdmin => Ok(Principal::RootAdmin),
            PrincipalKind::Admin => Ok(Principal::Admin),
        }
    }
}

fn encode(claims: &Claims, config: &Config) -> Result<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|error| {
        error!("Unable to sign session token: {}", error);
        ApplicationError::InternalServerError
    })
}

pub fn session_cookie(name: &'static str, token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(name, token)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.production)
        .path("/")
        .finish()
}

/// The cookie handed to `CookieJar::remove` on logout.
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "").path("/").finish()
}
