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

//! Define the commands supported by the CLI related to projects.

use futures::StreamExt as _;
use std::path::PathBuf;

use super::*;

/// Project related commands
#[derive(StructOpt, Debug, Clone)]
pub enum Command {
    List(List),
    Show(Show),
    Stats(ShowStats),
    Submit(Submit),
    SubmitEvidence(SubmitEvidence),
    UnderReview(UnderReview),
    Approve(Approve),
    Reject(Reject),
    Issue(Issue),
}

#[async_trait::async_trait]
impl CommandT for Command {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match self {
            Command::List(cmd) => cmd.run(ctx).await,
            Command::Show(cmd) => cmd.run(ctx).await,
            Command::Stats(cmd) => cmd.run(ctx).await,
            Command::Submit(cmd) => cmd.run(ctx).await,
            Command::SubmitEvidence(cmd) => cmd.run(ctx).await,
            Command::UnderReview(cmd) => cmd.run(ctx).await,
            Command::Approve(cmd) => cmd.run(ctx).await,
            Command::Reject(cmd) => cmd.run(ctx).await,
            Command::Issue(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Show information for a project.
pub struct Show {
    project_id: ProjectId,
}

#[async_trait::async_trait]
impl CommandT for Show {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let project = ctx.client.get_project(self.project_id).await?;
        println!("project: {}", project.id);
        println!("submitter: {}", project.submitter);
        println!("metadata: {}", project.metadata_ref);
        println!("claimed: {} t", project.claimed_amount);
        println!("approved: {} t", project.approved_amount);
        println!("status: {}", project.status);
        println!("submitted at: {}", project.submitted_at);
        println!("updated at: {}", project.updated_at);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// List all projects in the registry
pub struct List {}

#[async_trait::async_trait]
impl CommandT for List {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let mut projects = ctx.client.list_projects().await?;
        let mut count = 0;
        while let Some(project) = projects.next().await {
            println!(
                "{:>5}  {:<12} {:>8} t  {}",
                project.id,
                project.status.to_string(),
                project.claimed_amount,
                project.metadata_ref
            );
            count += 1;
        }
        println!("PROJECTS ({})", count);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Show totals over all projects
pub struct ShowStats {}

#[async_trait::async_trait]
impl CommandT for ShowStats {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let stats = ctx.client.get_stats().await?;
        println!("projects: {}", stats.total_projects);
        println!("claimed: {} t", stats.total_claimed);
        println!("approved: {} t", stats.total_approved);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Submit a project with a metadata reference and a claimed amount
pub struct Submit {
    /// Reference to the project evidence, for example `sha256:<hex>`
    metadata_ref: String,
    /// Claimed amount in tons
    claimed_amount: Tons,
}

#[async_trait::async_trait]
impl CommandT for Submit {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx("Submitting project...");
        let confirmation = client
            .submit(self.metadata_ref.clone(), self.claimed_amount)
            .await?;
        print_confirmation(&confirmation);
        print_project_id(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Submit a project from a drone survey file.
///
/// The file is a JSON object with the fields `avg_ndvi`, `area_ha` and `images`. The claimed
/// amount is estimated from the survey.
pub struct SubmitEvidence {
    #[structopt(parse(from_os_str))]
    path: PathBuf,
}

#[async_trait::async_trait]
impl CommandT for SubmitEvidence {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        let error = |reason: String| CommandError::EvidenceFile {
            path: self.path.clone(),
            reason,
        };
        let json = std::fs::read_to_string(&self.path).map_err(|e| error(e.to_string()))?;
        let evidence = Evidence::from_json(&json).map_err(Error::from)?;
        println!("estimated biomass: {} t", evidence.estimated_biomass());
        announce_tx("Submitting project...");
        let submission = client.submit_evidence(&evidence).await?;
        println!("metadata: {}", submission.metadata_ref);
        print_confirmation(&submission.confirmation);
        print_project_id(&submission.confirmation);
        Ok(())
    }
}

fn print_project_id(confirmation: &Confirmation) {
    match confirmation.project_id {
        Some(id) => println!("project id: {}", id),
        None => println!("project id unknown, see `project list`"),
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Start the review of a submitted project. Verifiers only.
pub struct UnderReview {
    project_id: ProjectId,
}

#[async_trait::async_trait]
impl CommandT for UnderReview {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!("Moving project {} to review...", self.project_id));
        let confirmation = client.set_under_review(self.project_id).await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Approve a project under review. Verifiers only.
pub struct Approve {
    project_id: ProjectId,
    /// Approved amount in tons. Must not exceed the claim.
    approved_amount: Tons,
}

#[async_trait::async_trait]
impl CommandT for Approve {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!(
            "Approving {} t for project {}...",
            self.approved_amount, self.project_id
        ));
        let confirmation = client
            .approve(self.project_id, self.approved_amount)
            .await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Reject a submitted project or a project under review. Verifiers only.
pub struct Reject {
    project_id: ProjectId,
}

#[async_trait::async_trait]
impl CommandT for Reject {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!("Rejecting project {}...", self.project_id));
        let confirmation = client.reject(self.project_id).await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}

#[derive(StructOpt, Debug, Clone)]
/// Issue the credits of an approved project
pub struct Issue {
    project_id: ProjectId,
    /// Address that receives the credits
    recipient: String,
}

#[async_trait::async_trait]
impl CommandT for Issue {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let client = ctx.signer()?;
        announce_tx(&format!(
            "Issuing credits of project {} to {}...",
            self.project_id, self.recipient
        ));
        let confirmation = client
            .issue_credits(self.project_id, &self.recipient)
            .await?;
        print_confirmation(&confirmation);
        Ok(())
    }
}
