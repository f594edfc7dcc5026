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

//! Define the commands supported by the CLI that
//! are not related to any specific domain.

use std::net::SocketAddr;

use super::*;
use crate::dashboard;

/// Other commands, not related to any specific domain.
#[derive(StructOpt, Debug, Clone)]
pub enum Command {
    Owner(ShowOwner),
    NetworkInfo(ShowNetworkInfo),
    Dashboard(Dashboard),
}

#[async_trait::async_trait]
impl CommandT for Command {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match self {
            Command::Owner(cmd) => cmd.run(ctx).await,
            Command::NetworkInfo(cmd) => cmd.run(ctx).await,
            Command::Dashboard(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Show the owner of the registry
pub struct ShowOwner {}

#[async_trait::async_trait]
impl CommandT for ShowOwner {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let owner = ctx.client.owner().await?;
        println!("Registry owner: {}", owner);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Show the network the client is connected to and the signing account
pub struct ShowNetworkInfo {}

#[async_trait::async_trait]
impl CommandT for ShowNetworkInfo {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let info = ctx.client.network_info().await;
        println!("network: {} (chain id {})", info.network, info.chain_id);
        println!("connected: {}", info.connected);
        if ctx.has_signer {
            println!("account: {}", info.account);
        } else {
            println!("account: none, set --private-key to sign transactions");
        }
        let contracts = ctx.client.contracts();
        println!("registry: {}", contracts.registry);
        println!("verification manager: {}", contracts.verification_manager);
        println!("token: {}", contracts.token);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Serve the dashboard JSON API
pub struct Dashboard {
    /// Address to listen on
    #[structopt(long, default_value = "127.0.0.1:5000", env = "MRV_DASHBOARD_LISTEN")]
    listen: SocketAddr,
}

#[async_trait::async_trait]
impl CommandT for Dashboard {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        if !ctx.has_signer {
            log::warn!("No private key configured, serving read-only routes");
        }
        dashboard::serve(self.listen, ctx.client.clone(), ctx.has_signer).await?;
        Ok(())
    }
}
