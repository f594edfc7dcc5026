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

//! Turn operations into fully specified unsigned requests.
use mrv_registry_core::{Address, Argument, ArgumentError, Call, Operation};

use crate::abi;
use crate::config::{Contracts, FeeBounds};
use crate::context::Context;

/// A request with everything fixed except the signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsignedRequest {
    pub call: Call,
    /// Contract the request is sent to.
    pub to: Address,
    /// ABI encoded calldata of `call`.
    pub data: Vec<u8>,
    pub sequence: u64,
    pub fees: FeeBounds,
    pub gas_limit: u64,
    pub chain_id: u64,
}

impl UnsignedRequest {
    pub fn operation(&self) -> Operation {
        self.call.operation()
    }
}

/// Builds [UnsignedRequest]s with the configured fee bounds. Purely local.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    contracts: Contracts,
    chain_id: u64,
    fees: FeeBounds,
    gas_limit: u64,
}

impl RequestBuilder {
    pub fn new(context: &Context) -> Self {
        RequestBuilder {
            contracts: context.contracts,
            chain_id: context.chain_id,
            fees: context.config.fees,
            gas_limit: context.config.gas_limit,
        }
    }

    /// Check `arguments` against the schema of `operation` and build the request.
    pub fn build(
        &self,
        operation: Operation,
        arguments: &[Argument],
        sequence: u64,
    ) -> Result<UnsignedRequest, ArgumentError> {
        let call = Call::from_arguments(operation, arguments)?;
        self.build_call(call, sequence)
    }

    pub fn build_call(&self, call: Call, sequence: u64) -> Result<UnsignedRequest, ArgumentError> {
        call.validate()?;
        Ok(UnsignedRequest {
            to: self.contracts.address_of(call.operation().target()),
            data: abi::encode_call(&call),
            call,
            sequence,
            fees: self.fees,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::Emulator;
    use crate::config::ClientConfig;
    use std::sync::Arc;

    fn builder() -> RequestBuilder {
        let context = Context {
            backend: Arc::new(Emulator::new(Address::ZERO)),
            contracts: Emulator::contracts(),
            chain_id: 5,
            config: ClientConfig::default(),
        };
        RequestBuilder::new(&context)
    }

    #[test]
    fn approve_request() {
        let request = builder()
            .build(
                Operation::ApproveProject,
                &[Argument::Uint(7), Argument::Uint(120)],
                4,
            )
            .unwrap();
        assert_eq!(
            request.call,
            Call::ApproveProject {
                project_id: 7,
                approved_amount: 120
            }
        );
        assert_eq!(request.to, Emulator::contracts().registry);
        assert_eq!(request.sequence, 4);
        assert_eq!(request.fees, FeeBounds::default());
        assert_eq!(request.gas_limit, 3_000_000);
        assert_eq!(request.chain_id, 5);
        assert_eq!(request.data, abi::encode_call(&request.call));
    }

    #[test]
    fn issuance_targets_verification_manager() {
        let recipient = Address::new([3u8; 20]);
        let request = builder()
            .build(
                Operation::IssueCredits,
                &[Argument::Uint(1), recipient.into()],
                0,
            )
            .unwrap();
        assert_eq!(request.to, Emulator::contracts().verification_manager);
    }

    #[test]
    fn invalid_arguments() {
        let error = builder()
            .build(Operation::SetUnderReview, &[], 0)
            .unwrap_err();
        assert!(matches!(error, ArgumentError::Arity { .. }));

        let error = builder()
            .build_call(Call::RejectProject { project_id: 0 }, 0)
            .unwrap_err();
        assert!(matches!(error, ArgumentError::ZeroProjectId { .. }));
    }
}
