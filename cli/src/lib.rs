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

//! Define the command line parser and interface.

use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use thiserror::Error as ThisError;

use mrv_registry_client::*;

pub mod dashboard;
pub mod logger;

mod command;
use command::{other, project, verifier};

/// The type that captures the command line.
#[derive(StructOpt, Clone)]
#[structopt(max_term_width = 80)]
pub struct CommandLine {
    /// Log more. Repeat for debug output. `RUST_LOG` takes precedence
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    #[structopt(flatten)]
    pub network_options: NetworkOptions,

    #[structopt(flatten)]
    pub tx_options: TxOptions,

    #[structopt(subcommand)]
    pub command: Command,
}

impl CommandLine {
    pub async fn run(self) -> Result<(), CommandError> {
        let ctx = CommandContext::create(&self.network_options, &self.tx_options).await?;
        self.command.run(&ctx).await
    }
}

/// Network-related command-line options
#[derive(StructOpt, Clone, Debug)]
pub struct NetworkOptions {
    /// JSON-RPC endpoint of the ledger node
    #[structopt(long, default_value = "http://127.0.0.1:8545", env = "MRV_RPC_URL")]
    pub rpc_url: url::Url,

    /// JSON file with the addresses of the deployed contracts
    #[structopt(
        long,
        default_value = "deployed/addresses.json",
        env = "MRV_CONTRACTS",
        parse(from_os_str)
    )]
    pub contracts: PathBuf,
}

impl NetworkOptions {
    pub fn load_contracts(&self) -> Result<Contracts, CommandError> {
        let error = |reason: String| CommandError::Contracts {
            path: self.contracts.clone(),
            reason,
        };
        let json = std::fs::read_to_string(&self.contracts).map_err(|e| error(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| error(e.to_string()))
    }
}

/// Transaction-related command-line options
#[derive(StructOpt, Clone)]
pub struct TxOptions {
    /// Hex-encoded secret key of the account that signs transactions.
    ///
    /// Commands that only read the registry do not need it.
    #[structopt(long, env = "PRIVATE_KEY", hide_env_values = true, value_name = "hex")]
    pub private_key: Option<String>,

    /// Tip per gas unit paid to the block producer, in gwei
    #[structopt(long, default_value = "2", env = "MRV_PRIORITY_FEE", value_name = "gwei")]
    pub priority_fee: u64,

    /// Maximum total fee per gas unit, in gwei
    #[structopt(long, default_value = "30", env = "MRV_MAX_FEE", value_name = "gwei")]
    pub max_fee: u64,

    #[structopt(long, default_value = "3000000", env = "MRV_GAS_LIMIT")]
    pub gas_limit: u64,

    /// Seconds to wait for a transaction to be confirmed
    #[structopt(
        long,
        default_value = "120",
        env = "MRV_CONFIRMATION_TIMEOUT",
        value_name = "seconds"
    )]
    pub confirmation_timeout: u64,
}

impl TxOptions {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            fees: FeeBounds {
                priority_fee: u128::from(self.priority_fee) * GWEI,
                max_fee: u128::from(self.max_fee) * GWEI,
            },
            gas_limit: self.gas_limit,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout),
            ..ClientConfig::default()
        }
    }

    /// The configured signing account. `None` if no private key is given.
    pub fn account(&self) -> Result<Option<SigningAccount>, CommandError> {
        match &self.private_key {
            Some(secret) => Ok(Some(SigningAccount::from_hex(secret)?)),
            None => Ok(None),
        }
    }
}

/// Contextual data for running commands. Created from command line options.
pub struct CommandContext {
    pub client: Client,
    /// `false` if the client signs with a throwaway account because no key was given.
    pub has_signer: bool,
}

impl CommandContext {
    pub async fn create(
        network_options: &NetworkOptions,
        tx_options: &TxOptions,
    ) -> Result<Self, CommandError> {
        let contracts = network_options.load_contracts()?;
        let (account, has_signer) = match tx_options.account()? {
            Some(account) => (account, true),
            None => (SigningAccount::generate(), false),
        };
        let client = Client::create(
            network_options.rpc_url.clone(),
            contracts,
            account,
            tx_options.client_config(),
        )
        .await?;
        Ok(CommandContext { client, has_signer })
    }

    /// The client, if it signs with a configured account.
    pub fn signer(&self) -> Result<&Client, CommandError> {
        if self.has_signer {
            Ok(&self.client)
        } else {
            Err(CommandError::MissingPrivateKey)
        }
    }
}

/// The supported [CommandLine] commands.
/// The commands are grouped by domain.
#[derive(StructOpt, Clone, Debug)]
pub enum Command {
    Project(project::Command),
    Verifier(verifier::Command),

    #[structopt(flatten)]
    Other(other::Command),
}

#[async_trait::async_trait]
impl CommandT for Command {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match self {
            Command::Project(cmd) => cmd.run(ctx).await,
            Command::Verifier(cmd) => cmd.run(ctx).await,
            Command::Other(cmd) => cmd.run(ctx).await,
        }
    }
}

/// The trait that every command must implement.
#[async_trait::async_trait]
pub trait CommandT {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError>;
}

/// Error returned by [CommandT::run].
///
/// Client errors are shown with their kind.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("{}: {}", .0.kind(), .0)]
    ClientError(#[from] Error),

    #[error("cannot read contract addresses from {}: {reason}", .path.display())]
    Contracts { path: PathBuf, reason: String },

    #[error("cannot read evidence from {}: {reason}", .path.display())]
    EvidenceFile { path: PathBuf, reason: String },

    #[error("invalid private key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("this command signs transactions, set --private-key or PRIVATE_KEY")]
    MissingPrivateKey,

    #[error("dashboard server failed: {0}")]
    Server(#[from] std::io::Error),
}
