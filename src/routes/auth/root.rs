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

use crate::auth::middleware::{reject_when_disabled, require_root_admin};
use crate::auth::session::ROOT_ADMIN_COOKIE;
use crate::auth::{Authenticate, RootAdmin};
use crate::database::definitions::employee::{Employee, WriteEmployee};
use crate::prelude::*;
use crate::routes::auth::{end_session, LoginRequest, Message};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use axum_extra::extract::CookieJar;

pub fn router(state: ApplicationState) -> Router {
    let login_route = Router::new()
        .route("/login", post(login))
        .route_layer(from_fn_with_state(state.clone(), reject_when_disabled));
    let verify_route = Router::new()
        .route("/verify", get(verify))
        .route_layer(from_fn_with_state(state.clone(), require_root_admin));
    let directory = Router::new()
        .route("/employees", post(add_employee))
        .route("/employees/:id", put(update_employee).delete(fire_employee))
        .route_layer(from_fn_with_state(state.clone(), require_root_admin))
        .route_layer(from_fn_with_state(state.clone(), reject_when_disabled));

    Router::new()
        .merge(login_route)
        .merge(verify_route)
        .merge(directory)
        .route("/logout", get(logout).post(logout))
        .with_state(state)
}

async fn login(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Json(data): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Message>)> {
    let (email, password) = data.credentials()?;
    let root = RootAdmin::from_email(email.as_str(), state.config())
        .ok_or_else(|| ApplicationError::unauthorized("Invalid credentials"))?;
    root.login(password)?;

    let cookie = root.start_session(state.config())?;
    info!("Root admin logged in");

    Ok((jar.add(cookie), Json("Login successful".into())))
}

#[derive(Serialize, Debug, Clone)]
pub struct EmployeeDirectory {
    employees: Vec<Employee>,
}

/// Confirms the session and hands out the full roster.
async fn verify(State(state): State<ApplicationState>) -> Result<Json<EmployeeDirectory>> {
    let employees = Employee::all(state.connection()).await?;

    Ok(Json(EmployeeDirectory { employees }))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<Message>) {
    (
        end_session(jar, ROOT_ADMIN_COOKIE),
        Json("Logged out successfully".into()),
    )
}

#[derive(Deserialize, Debug, Clone)]
pub struct EmployeeRequest {
    name: Option<String>,
    email: Option<String>,
    mobile: Option<String>,
    password: Option<String>,
    task: Option<Vec<u32>>,
}

impl EmployeeRequest {
    fn write<'a>(self, connection: &'a DatabaseConnection) -> WriteEmployee<'a> {
        WriteEmployee::from(connection)
            .set_name(self.name)
            .set_email(self.email)
            .set_mobile(self.mobile)
            .set_password(self.password)
            .set_task(self.task)
            .to_owned()
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct EmployeeChanged {
    message: &'static str,
    employee: Employee,
}

async fn add_employee(
    State(state): State<ApplicationState>,
    Json(data): Json<EmployeeRequest>,
) -> Result<(StatusCode, Json<EmployeeChanged>)> {
    let employee = data.write(state.connection()).await?;
    info!("Added employee {}", employee.id());

    Ok((
        StatusCode::CREATED,
        Json(EmployeeChanged {
            message: "Employee added successfully",
            employee,
        }),
    ))
}

async fn update_employee(
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
    Json(data): Json<EmployeeRequest>,
) -> Result<Json<EmployeeChanged>> {
    let id = Id::try_from(("employee", id.as_str()))?;
    let target = Employee::fetch(&id, state.connection())
        .await?
        .ok_or(ApplicationError::EmployeeNotFound)?;

    // every field is replaced, omitted tasks clear the capabilities
    let employee = data
        .write(state.connection())
        .set_target(Some(&target))
        .to_owned()
        .await?;
    info!("Updated employee {}", employee.id());

    Ok(Json(EmployeeChanged {
        message: "Employee updated successfully",
        employee,
    }))
}

#[derive(Serialize, Debug, Clone)]
pub struct FiredEmployee {
    id: Id,
    name: String,
    email: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct EmployeeFired {
    message: &'static str,
    employee: FiredEmployee,
}

async fn fire_employee(
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
) -> Result<Json<EmployeeFired>> {
    let id = Id::try_from(("employee", id.as_str()))?;
    let employee = Employee::fetch(&id, state.connection())
        .await?
        .ok_or(ApplicationError::EmployeeNotFound)?;
    employee.fire(state.connection()).await?;
    info!("Fired employee {}", employee.id());

    Ok(Json(EmployeeFired {
        message: "Employee fired successfully",
        employee: FiredEmployee {
            id: employee.id().clone(),
            name: employee.name().clone(),
            email: employee.email().clone(),
        },
    }))
}
