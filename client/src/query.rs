// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Read-only access to the registry state.
use futures::stream::{self, BoxStream, StreamExt as _};
use std::sync::Arc;

use mrv_registry_core::{Address, Project, ProjectId, Stats};

use crate::backend::Backend;
use crate::context::Context;
use crate::error::Error;

/// Reads registry state from the ledger. Nothing is cached.
#[derive(Clone)]
pub struct QueryFacade {
    backend: Arc<dyn Backend>,
}

impl QueryFacade {
    pub fn new(context: &Context) -> Self {
        QueryFacade {
            backend: context.backend.clone(),
        }
    }

    pub async fn owner(&self) -> Result<Address, Error> {
        self.backend.owner().await
    }

    /// Fails with [Error::ProjectNotFound] for ids the ledger has not assigned.
    pub async fn get_project(&self, id: ProjectId) -> Result<Project, Error> {
        if id == 0 {
            return Err(Error::ProjectNotFound(id));
        }
        self.backend
            .project(id)
            .await?
            .ok_or(Error::ProjectNotFound(id))
    }

    /// Stream all projects in id order.
    ///
    /// Only the id range is read up front. Each project is read when the stream is polled.
    /// Projects that cannot be read are skipped.
    pub async fn list_projects(&self) -> Result<BoxStream<'static, Project>, Error> {
        let next_id = self.backend.next_project_id().await?;
        let backend = self.backend.clone();
        let projects = stream::iter(1..next_id).filter_map(move |id| {
            let backend = backend.clone();
            async move {
                match backend.project(id).await {
                    Ok(Some(project)) => Some(project),
                    Ok(None) => {
                        log::warn!("Skipping project {}: not found", id);
                        None
                    }
                    Err(error) => {
                        log::warn!("Skipping project {}: {}", id, error);
                        None
                    }
                }
            }
        });
        Ok(projects.boxed())
    }

    pub async fn get_stats(&self) -> Result<Stats, Error> {
        let stats = self
            .list_projects()
            .await?
            .fold(Stats::default(), |stats, project| async move {
                stats.with(&project)
            })
            .await;
        Ok(stats)
    }

    /// All projects, most recently submitted first.
    pub async fn records(&self) -> Result<Vec<Project>, Error> {
        let mut projects: Vec<Project> = self.list_projects().await?.collect().await;
        projects.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    pub async fn is_verifier(&self, address: Address) -> Result<bool, Error> {
        self.backend.is_verifier(address).await
    }
}
