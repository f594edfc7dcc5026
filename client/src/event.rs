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

//! Events emitted by the registry contracts when a transaction is applied.
use mrv_registry_core::{Address, ProjectId, ProjectStatus, Tons};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    ProjectSubmitted {
        project_id: ProjectId,
        submitter: Address,
    },
    StatusChanged {
        project_id: ProjectId,
        status: ProjectStatus,
    },
    VerifierAdded(Address),
    VerifierRemoved(Address),
    CreditsIssued {
        project_id: ProjectId,
        recipient: Address,
        amount: Tons,
    },
}

/// Id assigned to the project submitted by the transaction that emitted `events`.
pub fn submitted_project_id(events: &[Event]) -> Option<ProjectId> {
    events.iter().find_map(|event| match event {
        Event::ProjectSubmitted { project_id, .. } => Some(*project_id),
        _ => None,
    })
}
