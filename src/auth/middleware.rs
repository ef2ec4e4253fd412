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

use crate::auth::session::{Principal, EMPLOYEE_COOKIE, ROOT_ADMIN_COOKIE};
use crate::database::definitions::employee::Employee;
use crate::prelude::*;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

/// Resolves the employee behind `employeeToken` and hands the fresh record to the handler.
pub async fn require_employee<B>(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response> {
    let cookie = jar
        .get(EMPLOYEE_COOKIE)
        .ok_or_else(|| ApplicationError::unauthorized("Authentication required"))?;

    let Principal::Employee(id) = Principal::verify(cookie.value(), state.config())? else {
        return Err(ApplicationError::unauthorized("Invalid token"));
    };
    // the record is read again on every request, fired employees lose access at once
    let employee = Employee::fetch(&id, state.connection())
        .await?
        .ok_or_else(|| ApplicationError::unauthorized("Employee not found"))?;

    request.extensions_mut().insert(employee);
    Ok(next.run(request).await)
}

pub async fn require_root_admin<B>(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response> {
    let cookie = jar
        .get(ROOT_ADMIN_COOKIE)
        .ok_or_else(|| ApplicationError::unauthorized("Authentication required"))?;

    match Principal::verify(cookie.value(), state.config())? {
        Principal::RootAdmin => {
            request.extensions_mut().insert(Principal::RootAdmin);
            Ok(next.run(request).await)
        }
        _ => Err(ApplicationError::unauthorized("Invalid token")),
    }
}

/// Maintenance mode, every mutating route is wrapped by this.
pub async fn reject_when_disabled<B>(
    State(state): State<ApplicationState>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response> {
    if state.config().disabled {
        return Err(ApplicationError::Disabled);
    }

    Ok(next.run(request).await)
}
