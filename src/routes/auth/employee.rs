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

use crate::auth::middleware::{reject_when_disabled, require_employee};
use crate::auth::session::EMPLOYEE_COOKIE;
use crate::auth::Authenticate;
use crate::database::definitions::employee::{Employee, TaskCapability};
use crate::prelude::*;
use crate::routes::auth::{end_session, LoginRequest, Message};
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Extension, Router};
use axum_extra::extract::CookieJar;

pub fn router(state: ApplicationState) -> Router {
    let login_route = Router::new()
        .route("/login", post(login))
        .route_layer(from_fn_with_state(state.clone(), reject_when_disabled));
    let verify_route = Router::new()
        .route("/verify", get(verify))
        .route_layer(from_fn_with_state(state.clone(), require_employee));

    Router::new()
        .merge(login_route)
        .merge(verify_route)
        .route("/logout", get(logout).post(logout))
        .with_state(state)
}

/// The employee as shown to themselves, with readable task names.
#[derive(Serialize, Debug, Clone)]
pub struct EmployeeProfile {
    #[serde(flatten)]
    employee: Employee,
    capabilities: Vec<TaskCapability>,
}

impl From<Employee> for EmployeeProfile {
    fn from(employee: Employee) -> Self {
        Self {
            capabilities: employee.capabilities(),
            employee,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct EmployeeSession {
    message: &'static str,
    employee: EmployeeProfile,
}

async fn login(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Json(data): Json<LoginRequest>,
) -> Result<(CookieJar, Json<EmployeeSession>)> {
    let (email, password) = data.credentials()?;

    // unknown addresses and wrong passwords look the same from outside
    let employee = Employee::from_email(email.as_str(), state.connection())
        .await?
        .ok_or_else(|| ApplicationError::unauthorized("Invalid credentials"))?;
    employee.login(password)?;

    let cookie = employee.start_session(state.config())?;
    info!("Employee {} logged in", employee.id());

    Ok((
        jar.add(cookie),
        Json(EmployeeSession {
            message: "Login successful",
            employee: employee.into(),
        }),
    ))
}

async fn verify(Extension(employee): Extension<Employee>) -> Json<EmployeeSession> {
    Json(EmployeeSession {
        message: "Token is valid",
        employee: employee.into(),
    })
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<Message>) {
    (
        end_session(jar, EMPLOYEE_COOKIE),
        Json("Logged out successfully".into()),
    )
}
