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

//! Type definitions for all entities read from the ledger state.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::{Address, ProjectId, Timestamp, Tons};

/// A submitted carbon-offset claim.
///
/// # Invariants
///
/// * `id`, `submitter`, `metadata_ref` and `claimed_amount` never change after submission.
/// * `approved_amount` is zero until the project is approved and is set exactly once.
/// * `approved_amount <= claimed_amount`
/// * `submitted_at <= updated_at`
///
/// # Relevant messages
///
/// * [crate::Call::SubmitProject]
/// * [crate::Call::SetUnderReview]
/// * [crate::Call::ApproveProject]
/// * [crate::Call::RejectProject]
/// * [crate::Call::IssueCredits]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub submitter: Address,
    /// Content-addressed reference to the project evidence, see [crate::evidence].
    pub metadata_ref: String,
    pub claimed_amount: Tons,
    pub approved_amount: Tons,
    pub status: ProjectStatus,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Lifecycle status of a [Project]. See [crate::lifecycle] for the legal transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProjectStatus {
    Submitted,
    UnderReview,
    Approved,
    Tokenized,
    Rejected,
}

/// Failure to interpret a status code read from the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum StatusCodeError {
    /// Code `0`. The ledger reports it for ids that were never assigned.
    #[error("status is unset")]
    Unset,
    #[error("unknown status code {0}")]
    Unknown(u8),
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Submitted,
        ProjectStatus::UnderReview,
        ProjectStatus::Approved,
        ProjectStatus::Tokenized,
        ProjectStatus::Rejected,
    ];

    /// Status code used by the ledger. Code `0` is reserved for the unset state.
    pub fn code(self) -> u8 {
        match self {
            ProjectStatus::Submitted => 1,
            ProjectStatus::UnderReview => 2,
            ProjectStatus::Approved => 3,
            ProjectStatus::Tokenized => 4,
            ProjectStatus::Rejected => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, StatusCodeError> {
        match code {
            0 => Err(StatusCodeError::Unset),
            1 => Ok(ProjectStatus::Submitted),
            2 => Ok(ProjectStatus::UnderReview),
            3 => Ok(ProjectStatus::Approved),
            4 => Ok(ProjectStatus::Tokenized),
            5 => Ok(ProjectStatus::Rejected),
            code => Err(StatusCodeError::Unknown(code)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProjectStatus::Submitted => "Submitted",
            ProjectStatus::UnderReview => "UnderReview",
            ProjectStatus::Approved => "Approved",
            ProjectStatus::Tokenized => "Tokenized",
            ProjectStatus::Rejected => "Rejected",
        }
    }

    /// `true` for statuses without outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Tokenized | ProjectStatus::Rejected)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ProjectStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Aggregate figures over all readable projects.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_projects: u64,
    pub total_claimed: Tons,
    pub total_approved: Tons,
}

impl Stats {
    /// Return the stats with `project` added.
    pub fn with(self, project: &Project) -> Self {
        Stats {
            total_projects: self.total_projects + 1,
            total_claimed: self.total_claimed.saturating_add(project.claimed_amount),
            total_approved: self.total_approved.saturating_add(project.approved_amount),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_codes() {
        for status in ProjectStatus::ALL.iter() {
            assert_eq!(ProjectStatus::from_code(status.code()), Ok(*status));
        }
        assert_eq!(ProjectStatus::from_code(0), Err(StatusCodeError::Unset));
        assert_eq!(ProjectStatus::from_code(6), Err(StatusCodeError::Unknown(6)));
        assert_eq!(ProjectStatus::Submitted.code(), 1);
        assert_eq!(ProjectStatus::Rejected.code(), 5);
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = ProjectStatus::ALL
            .iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![&ProjectStatus::Tokenized, &ProjectStatus::Rejected]
        );
    }

    #[test]
    fn stats_fold() {
        let project = |claimed, approved| Project {
            id: 1,
            submitter: Address::ZERO,
            metadata_ref: String::from("sha256:00"),
            claimed_amount: claimed,
            approved_amount: approved,
            status: ProjectStatus::Approved,
            submitted_at: 0,
            updated_at: 0,
        };
        let stats = [project(15, 10), project(7, 0)]
            .iter()
            .fold(Stats::default(), Stats::with);
        assert_eq!(
            stats,
            Stats {
                total_projects: 2,
                total_claimed: 22,
                total_approved: 10,
            }
        );
    }
}
