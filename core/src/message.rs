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

//! State-changing operations of the registry ledger and their argument schema.
//!
//! Presentation layers hand over loosely typed [Argument]s. [Call::from_arguments] checks them
//! against the fixed schema of the [Operation] and produces a typed [Call]. Nothing here touches
//! the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Address, AddressError, ProjectId, Tons};

/// Ledger contract an [Operation] is sent to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Contract {
    Registry,
    VerificationManager,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    AddVerifier,
    RemoveVerifier,
    SetUnderReview,
    ApproveProject,
    RejectProject,
    SubmitProject,
    IssueCredits,
}

/// Type of a single operation parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamKind {
    Address,
    ProjectId,
    Tons,
    MetadataRef,
}

impl ParamKind {
    fn describe(self) -> &'static str {
        match self {
            ParamKind::Address => "an address string",
            ParamKind::ProjectId => "an unsigned integer",
            ParamKind::Tons => "an unsigned integer",
            ParamKind::MetadataRef => "a string",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
}

const fn param(name: &'static str, kind: ParamKind) -> Param {
    Param { name, kind }
}

const VERIFIER_PARAMS: &[Param] = &[param("verifier", ParamKind::Address)];
const PROJECT_PARAMS: &[Param] = &[param("project_id", ParamKind::ProjectId)];
const APPROVE_PARAMS: &[Param] = &[
    param("project_id", ParamKind::ProjectId),
    param("approved_amount", ParamKind::Tons),
];
const SUBMIT_PARAMS: &[Param] = &[
    param("metadata_ref", ParamKind::MetadataRef),
    param("claimed_amount", ParamKind::Tons),
];
const ISSUE_PARAMS: &[Param] = &[
    param("project_id", ParamKind::ProjectId),
    param("recipient", ParamKind::Address),
];

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::AddVerifier,
        Operation::RemoveVerifier,
        Operation::SetUnderReview,
        Operation::ApproveProject,
        Operation::RejectProject,
        Operation::SubmitProject,
        Operation::IssueCredits,
    ];

    /// Name of the contract function implementing the operation.
    pub fn name(self) -> &'static str {
        match self {
            Operation::AddVerifier => "addVerifier",
            Operation::RemoveVerifier => "removeVerifier",
            Operation::SetUnderReview => "setUnderReview",
            Operation::ApproveProject => "approveProject",
            Operation::RejectProject => "rejectProject",
            Operation::SubmitProject => "submitProject",
            Operation::IssueCredits => "issueCredits",
        }
    }

    /// Ordered parameter list of the operation.
    pub fn params(self) -> &'static [Param] {
        match self {
            Operation::AddVerifier | Operation::RemoveVerifier => VERIFIER_PARAMS,
            Operation::SetUnderReview | Operation::RejectProject => PROJECT_PARAMS,
            Operation::ApproveProject => APPROVE_PARAMS,
            Operation::SubmitProject => SUBMIT_PARAMS,
            Operation::IssueCredits => ISSUE_PARAMS,
        }
    }

    pub fn target(self) -> Contract {
        match self {
            Operation::IssueCredits => Contract::VerificationManager,
            _ => Contract::Registry,
        }
    }

    /// Operations the ledger only accepts from registered verifiers.
    pub fn requires_verifier(self) -> bool {
        matches!(
            self,
            Operation::SetUnderReview | Operation::ApproveProject | Operation::RejectProject
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|operation| operation.name() == s)
            .ok_or_else(|| format!("unknown operation {}", s))
    }
}

/// A loosely typed argument as it arrives from a presentation layer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Uint(u64),
    Text(String),
}

impl From<u64> for Argument {
    fn from(value: u64) -> Self {
        Argument::Uint(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<Address> for Argument {
    fn from(value: Address) -> Self {
        Argument::Text(value.to_string())
    }
}

/// Arguments that do not fit the schema of an [Operation].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("{operation} expects {expected} arguments, got {actual}")]
    Arity {
        operation: Operation,
        expected: usize,
        actual: usize,
    },

    #[error("argument `{param}` of {operation} must be {expected}")]
    Type {
        operation: Operation,
        param: &'static str,
        expected: &'static str,
    },

    #[error("argument `{param}` of {operation} is not a well-formed address: {source}")]
    MalformedAddress {
        operation: Operation,
        param: &'static str,
        #[source]
        source: AddressError,
    },

    #[error("argument `{param}` of {operation} must not be the zero address")]
    ZeroAddress {
        operation: Operation,
        param: &'static str,
    },

    #[error("argument `{param}` of {operation} must be a positive project id")]
    ZeroProjectId {
        operation: Operation,
        param: &'static str,
    },

    #[error("argument `{param}` of {operation} must not be empty")]
    Empty {
        operation: Operation,
        param: &'static str,
    },
}

/// A fully typed state-changing operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    AddVerifier {
        verifier: Address,
    },
    RemoveVerifier {
        verifier: Address,
    },
    SetUnderReview {
        project_id: ProjectId,
    },
    ApproveProject {
        project_id: ProjectId,
        approved_amount: Tons,
    },
    RejectProject {
        project_id: ProjectId,
    },
    SubmitProject {
        metadata_ref: String,
        claimed_amount: Tons,
    },
    IssueCredits {
        project_id: ProjectId,
        recipient: Address,
    },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::AddVerifier { .. } => Operation::AddVerifier,
            Call::RemoveVerifier { .. } => Operation::RemoveVerifier,
            Call::SetUnderReview { .. } => Operation::SetUnderReview,
            Call::ApproveProject { .. } => Operation::ApproveProject,
            Call::RejectProject { .. } => Operation::RejectProject,
            Call::SubmitProject { .. } => Operation::SubmitProject,
            Call::IssueCredits { .. } => Operation::IssueCredits,
        }
    }

    /// The existing project the call acts on, if any.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Call::SetUnderReview { project_id }
            | Call::ApproveProject { project_id, .. }
            | Call::RejectProject { project_id }
            | Call::IssueCredits { project_id, .. } => Some(*project_id),
            Call::AddVerifier { .. } | Call::RemoveVerifier { .. } | Call::SubmitProject { .. } => {
                None
            }
        }
    }

    /// The call's arguments in schema order.
    pub fn arguments(&self) -> Vec<Argument> {
        match self {
            Call::AddVerifier { verifier } | Call::RemoveVerifier { verifier } => {
                vec![(*verifier).into()]
            }
            Call::SetUnderReview { project_id } | Call::RejectProject { project_id } => {
                vec![(*project_id).into()]
            }
            Call::ApproveProject {
                project_id,
                approved_amount,
            } => vec![(*project_id).into(), (*approved_amount).into()],
            Call::SubmitProject {
                metadata_ref,
                claimed_amount,
            } => vec![metadata_ref.clone().into(), (*claimed_amount).into()],
            Call::IssueCredits {
                project_id,
                recipient,
            } => vec![(*project_id).into(), (*recipient).into()],
        }
    }

    /// Check `arguments` against the schema of `operation` and build the typed call.
    pub fn from_arguments(
        operation: Operation,
        arguments: &[Argument],
    ) -> Result<Self, ArgumentError> {
        let params = operation.params();
        if arguments.len() != params.len() {
            return Err(ArgumentError::Arity {
                operation,
                expected: params.len(),
                actual: arguments.len(),
            });
        }

        let arguments = Arguments {
            operation,
            params,
            values: arguments,
        };
        let call = match operation {
            Operation::AddVerifier => Call::AddVerifier {
                verifier: arguments.address(0)?,
            },
            Operation::RemoveVerifier => Call::RemoveVerifier {
                verifier: arguments.address(0)?,
            },
            Operation::SetUnderReview => Call::SetUnderReview {
                project_id: arguments.uint(0)?,
            },
            Operation::ApproveProject => Call::ApproveProject {
                project_id: arguments.uint(0)?,
                approved_amount: arguments.uint(1)?,
            },
            Operation::RejectProject => Call::RejectProject {
                project_id: arguments.uint(0)?,
            },
            Operation::SubmitProject => Call::SubmitProject {
                metadata_ref: arguments.text(0)?,
                claimed_amount: arguments.uint(1)?,
            },
            Operation::IssueCredits => Call::IssueCredits {
                project_id: arguments.uint(0)?,
                recipient: arguments.address(1)?,
            },
        };
        call.validate()?;
        Ok(call)
    }

    /// Value checks that go beyond the parameter types.
    ///
    /// Project ids must be positive, metadata references non-empty, and addresses must not be
    /// the zero address.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        let operation = self.operation();
        let params = operation.params();
        for (param, argument) in params.iter().zip(self.arguments()) {
            match (param.kind, argument) {
                (ParamKind::ProjectId, Argument::Uint(0)) => {
                    return Err(ArgumentError::ZeroProjectId {
                        operation,
                        param: param.name,
                    })
                }
                (ParamKind::MetadataRef, Argument::Text(text)) if text.trim().is_empty() => {
                    return Err(ArgumentError::Empty {
                        operation,
                        param: param.name,
                    })
                }
                _ => (),
            }
        }
        match self {
            Call::AddVerifier { verifier } | Call::RemoveVerifier { verifier }
                if verifier.is_zero() =>
            {
                Err(ArgumentError::ZeroAddress {
                    operation,
                    param: "verifier",
                })
            }
            Call::IssueCredits { recipient, .. } if recipient.is_zero() => {
                Err(ArgumentError::ZeroAddress {
                    operation,
                    param: "recipient",
                })
            }
            _ => Ok(()),
        }
    }
}

/// Arguments paired with the parameters of an operation. Each accessor checks the argument at
/// `index` against the kind of its parameter.
struct Arguments<'a> {
    operation: Operation,
    params: &'static [Param],
    values: &'a [Argument],
}

impl<'a> Arguments<'a> {
    fn get(&self, index: usize) -> Result<(&'static Param, &'a Argument), ArgumentError> {
        match (self.params.get(index), self.values.get(index)) {
            (Some(param), Some(argument)) => Ok((param, argument)),
            _ => Err(ArgumentError::Arity {
                operation: self.operation,
                expected: self.params.len(),
                actual: self.values.len(),
            }),
        }
    }

    fn type_error(&self, param: &Param) -> ArgumentError {
        ArgumentError::Type {
            operation: self.operation,
            param: param.name,
            expected: param.kind.describe(),
        }
    }

    fn uint(&self, index: usize) -> Result<u64, ArgumentError> {
        match self.get(index)? {
            (param, Argument::Uint(value))
                if matches!(param.kind, ParamKind::ProjectId | ParamKind::Tons) =>
            {
                Ok(*value)
            }
            (param, _) => Err(self.type_error(param)),
        }
    }

    fn text(&self, index: usize) -> Result<String, ArgumentError> {
        match self.get(index)? {
            (param, Argument::Text(text)) if param.kind == ParamKind::MetadataRef => {
                Ok(text.clone())
            }
            (param, _) => Err(self.type_error(param)),
        }
    }

    fn address(&self, index: usize) -> Result<Address, ArgumentError> {
        match self.get(index)? {
            (param, Argument::Text(text)) if param.kind == ParamKind::Address => {
                text.parse().map_err(|source| ArgumentError::MalformedAddress {
                    operation: self.operation,
                    param: param.name,
                    source,
                })
            }
            (param, _) => Err(self.type_error(param)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn alice() -> Address {
        "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap()
    }

    #[test]
    fn arguments_follow_schema() {
        let calls = vec![
            Call::AddVerifier { verifier: alice() },
            Call::RemoveVerifier { verifier: alice() },
            Call::SetUnderReview { project_id: 7 },
            Call::ApproveProject {
                project_id: 7,
                approved_amount: 120,
            },
            Call::RejectProject { project_id: 7 },
            Call::SubmitProject {
                metadata_ref: String::from("sha256:abcd"),
                claimed_amount: 15,
            },
            Call::IssueCredits {
                project_id: 7,
                recipient: alice(),
            },
        ];
        for call in calls {
            let operation = call.operation();
            assert_eq!(call.arguments().len(), operation.params().len());
            assert_eq!(Call::from_arguments(operation, &call.arguments()), Ok(call));
        }
    }

    #[test]
    fn every_parameter_is_type_checked() {
        let valid = |kind| match kind {
            ParamKind::Address => Argument::from(alice()),
            ParamKind::ProjectId | ParamKind::Tons => Argument::Uint(7),
            ParamKind::MetadataRef => Argument::from("sha256:abcd"),
        };
        let wrong = |kind| match kind {
            ParamKind::Address | ParamKind::MetadataRef => Argument::Uint(7),
            ParamKind::ProjectId | ParamKind::Tons => Argument::from("7"),
        };
        for operation in Operation::ALL.iter().copied() {
            let params = operation.params();
            let arguments: Vec<_> = params.iter().map(|param| valid(param.kind)).collect();
            assert!(Call::from_arguments(operation, &arguments).is_ok());
            for (index, param) in params.iter().enumerate() {
                let mut arguments = arguments.clone();
                arguments[index] = wrong(param.kind);
                assert_eq!(
                    Call::from_arguments(operation, &arguments),
                    Err(ArgumentError::Type {
                        operation,
                        param: param.name,
                        expected: param.kind.describe(),
                    })
                );
            }
        }
    }

    #[test]
    fn arity_mismatch() {
        let result = Call::from_arguments(Operation::ApproveProject, &[Argument::Uint(7)]);
        assert_eq!(
            result,
            Err(ArgumentError::Arity {
                operation: Operation::ApproveProject,
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn type_mismatch() {
        let result = Call::from_arguments(
            Operation::ApproveProject,
            &[Argument::from("7"), Argument::Uint(120)],
        );
        assert!(matches!(
            result,
            Err(ArgumentError::Type {
                param: "project_id",
                ..
            })
        ));

        let result = Call::from_arguments(Operation::AddVerifier, &[Argument::Uint(1)]);
        assert!(matches!(result, Err(ArgumentError::Type { .. })));
    }

    #[test]
    fn malformed_recipient() {
        let result = Call::from_arguments(
            Operation::IssueCredits,
            &[Argument::Uint(1), Argument::from("0xnot-an-address")],
        );
        assert!(matches!(
            result,
            Err(ArgumentError::MalformedAddress {
                param: "recipient",
                ..
            })
        ));
    }

    #[test]
    fn value_checks() {
        assert!(matches!(
            Call::from_arguments(Operation::RejectProject, &[Argument::Uint(0)]),
            Err(ArgumentError::ZeroProjectId { .. })
        ));
        assert!(matches!(
            Call::from_arguments(
                Operation::SubmitProject,
                &[Argument::from("  "), Argument::Uint(3)]
            ),
            Err(ArgumentError::Empty { .. })
        ));
        assert!(matches!(
            Call::IssueCredits {
                project_id: 1,
                recipient: Address::ZERO
            }
            .validate(),
            Err(ArgumentError::ZeroAddress {
                param: "recipient",
                ..
            })
        ));
    }

    #[test]
    fn operation_names() {
        for operation in Operation::ALL.iter() {
            assert_eq!(operation.name().parse::<Operation>(), Ok(*operation));
        }
        assert!("mint".parse::<Operation>().is_err());
        assert_eq!(
            Operation::IssueCredits.target(),
            Contract::VerificationManager
        );
        assert_eq!(Operation::ApproveProject.target(), Contract::Registry);
    }
}
