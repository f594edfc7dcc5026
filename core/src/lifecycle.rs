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

//! Client-side mirror of the project status state machine.
//!
//! ```text
//! Submitted --setUnderReview--> UnderReview --approveProject--> Approved --issueCredits--> Tokenized
//!     |                              |
//!     +-------rejectProject----------+--rejectProject--> Rejected
//! ```
//!
//! The ledger validates every transition again. A check that passes here can still be rejected
//! by the ledger when another request changed the project in between.

use crate::{Call, Operation, Project, ProjectId, ProjectStatus, Tons};

/// A legal edge of the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: ProjectStatus,
    pub operation: Operation,
    pub to: ProjectStatus,
}

const fn edge(from: ProjectStatus, operation: Operation, to: ProjectStatus) -> Transition {
    Transition {
        from,
        operation,
        to,
    }
}

pub const TRANSITIONS: [Transition; 5] = [
    edge(
        ProjectStatus::Submitted,
        Operation::SetUnderReview,
        ProjectStatus::UnderReview,
    ),
    edge(
        ProjectStatus::Submitted,
        Operation::RejectProject,
        ProjectStatus::Rejected,
    ),
    edge(
        ProjectStatus::UnderReview,
        Operation::RejectProject,
        ProjectStatus::Rejected,
    ),
    edge(
        ProjectStatus::UnderReview,
        Operation::ApproveProject,
        ProjectStatus::Approved,
    ),
    edge(
        ProjectStatus::Approved,
        Operation::IssueCredits,
        ProjectStatus::Tokenized,
    ),
];

/// Target status of applying `operation` to a project in status `from`. `None` if the
/// transition is not legal.
pub fn transition(from: ProjectStatus, operation: Operation) -> Option<ProjectStatus> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.operation == operation)
        .map(|t| t.to)
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("{operation} is not allowed for project {project_id} in status {status}")]
    InvalidStatus {
        project_id: ProjectId,
        operation: Operation,
        status: ProjectStatus,
    },

    #[error("cannot approve {approved} tons for project {project_id}, only {claimed} tons were claimed")]
    ApprovedExceedsClaimed {
        project_id: ProjectId,
        approved: Tons,
        claimed: Tons,
    },

    #[error("{operation} requires the sender to be a registered verifier")]
    CallerNotVerifier { operation: Operation },

    #[error("call is for project {actual} but project {expected} was provided")]
    ProjectMismatch {
        expected: ProjectId,
        actual: ProjectId,
    },

    #[error("{0} does not change the status of an existing project")]
    NotALifecycleOperation(Operation),
}

/// Check that `call` is a legal transition for `project` and return the resulting status.
///
/// `caller_is_verifier` is only consulted for operations gated on the verifier set.
pub fn validate(
    project: &Project,
    call: &Call,
    caller_is_verifier: bool,
) -> Result<ProjectStatus, TransitionError> {
    let operation = call.operation();
    let project_id = call
        .project_id()
        .ok_or(TransitionError::NotALifecycleOperation(operation))?;
    if project_id != project.id {
        return Err(TransitionError::ProjectMismatch {
            expected: project.id,
            actual: project_id,
        });
    }

    let to = transition(project.status, operation).ok_or(TransitionError::InvalidStatus {
        project_id,
        operation,
        status: project.status,
    })?;

    if operation.requires_verifier() && !caller_is_verifier {
        return Err(TransitionError::CallerNotVerifier { operation });
    }

    if let Call::ApproveProject {
        approved_amount, ..
    } = call
    {
        if *approved_amount > project.claimed_amount {
            return Err(TransitionError::ApprovedExceedsClaimed {
                project_id,
                approved: *approved_amount,
                claimed: project.claimed_amount,
            });
        }
    }

    Ok(to)
}
