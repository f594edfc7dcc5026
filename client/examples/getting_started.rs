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

//! Getting started with the client by taking a project through its lifecycle.
//!
//! The example runs against the in-memory emulator, so no node is needed. Replace
//! [Client::with_emulator] with [Client::create] to talk to a real node.

use mrv_registry_client::*;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    // The owner deploys the contracts. The emulator makes `owner` the registry owner.
    let owner = SigningAccount::generate();
    let emulator = Emulator::new(owner.address());
    let owner = Client::with_emulator(&emulator, owner, ClientConfig::default());
    println!("Registry owner: {}", owner.address());

    // Only verifiers review projects, and only the owner registers verifiers.
    let verifier = Client::with_emulator(&emulator, SigningAccount::generate(), ClientConfig::default());
    owner.add_verifier(verifier.address()).await?;
    println!("Registered verifier {}", verifier.address());

    // Evidence collected by a drone survey. The claim is estimated from the evidence.
    let evidence = Evidence::new(0.6, 2.5, vec![String::from("img1.jpg")]);
    let submission = verifier.submit_evidence(&evidence).await?;
    let project_id = submission.confirmation.project_id.unwrap_or_default();
    println!(
        "Submitted project {} claiming {} tons with metadata {}",
        project_id, submission.estimated_tons, submission.metadata_ref
    );

    verifier.set_under_review(project_id).await?;

    // Approving more than the claim fails locally without sending anything.
    match verifier.approve(project_id, 100).await {
        Err(err) => println!("Approval rejected: {} ({})", err, err.kind()),
        Ok(_) => println!("Unexpected approval"),
    }
    let confirmation = verifier.approve(project_id, 12).await?;
    println!(
        "Approved 12 tons in transaction {} (block {})",
        confirmation.tx_hash, confirmation.block_number
    );

    let recipient = SigningAccount::generate().address();
    owner
        .issue_credits(project_id, &recipient.to_string())
        .await?;
    println!(
        "Issued {} credits to {}",
        emulator.balance_of(recipient),
        recipient
    );

    let project = owner.get_project(project_id).await?;
    println!("Project {} is now {}", project.id, project.status);
    println!("Registry stats: {:?}", owner.get_stats().await?);

    Ok(())
}
