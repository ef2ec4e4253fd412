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

use crate::hook::mail::Mailer;
use crate::prelude::*;
use crate::storage::ObjectStorage;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ApplicationState {
    info: ConnectionInfo,
    config: Arc<Config>,
    storage: Arc<dyn ObjectStorage>,
    mailer: Arc<dyn Mailer>,
}

impl ApplicationState {
    pub fn new(
        info: ConnectionInfo,
        config: Config,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            info,
            config: Arc::new(config),
            storage,
            mailer,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.info.connection
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}
