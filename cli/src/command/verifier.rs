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

//! Define the commands supported by the CLI related to verifiers.

use super::*;

/// Verifier related commands
#[derive(StructOpt, Debug, Clone)]
pub enum Command {
    Add(Add),
    Remove(Remove),
    Check(Check),
}

#[async_trait::async_trait]
impl CommandT for Command {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match self {
            Command::Add(cmd) => cmd.run(ctx).await,
            Command::Remove(cmd) => cmd.run(ctx).await,
            Command::Check(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Register an account as verifier. Only the registry owner may do this.
pub struct Add {
    /// Address of the verifier account
    address: String,
}

#[async_trait::async_trait]
impl CommandT for Add {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!("Adding verifier {}...", self.address));
        let confirmation = client
            .execute(
                Operation::AddVerifier,
                vec![Argument::from(self.address.as_str())],
            )
            .await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Remove an account from the verifiers. Only the registry owner may do this.
pub struct Remove {
    /// Address of the verifier account
    address: String,
}

#[async_trait::async_trait]
impl CommandT for Remove {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!("Removing verifier {}...", self.address));
        let confirmation = client
            .execute(
                Operation::RemoveVerifier,
                vec![Argument::from(self.address.as_str())],
            )
            .await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Show whether an account is a registered verifier
pub struct Check {
    #[structopt(parse(try_from_str))]
    address: Address,
}

#[async_trait::async_trait]
impl CommandT for Check {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        if ctx.client.is_verifier(self.address).await? {
            println!("{} is a verifier", self.address);
        } else {
            println!("{} is not a verifier", self.address);
        }
        Ok(())
    }
}
