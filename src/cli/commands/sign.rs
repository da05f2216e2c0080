//! Sign command implementation.

use crate::auth::envelope::SignedRequest;
use crate::auth::keys::Keypair;
use crate::auth::salt::Salt;
use anyhow::{Context, Result};
use clap::Args;

/// Produce a signed request envelope.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Passphrase the tenant keypair is derived from.
    #[arg(long)]
    pub passphrase: String,

    /// Current salt, hex encoded.
    #[arg(long)]
    pub salt: String,

    /// Request body as JSON.
    #[arg(long)]
    pub body: String,
}

/// Run the sign command.
pub fn run_sign(args: SignArgs) -> Result<()> {
    let keypair = Keypair::derive(&args.passphrase)?;
    let salt = Salt::from_hex(&args.salt).context("salt must be hex")?;
    let body: serde_json::Value =
        serde_json::from_str(&args.body).context("body must be valid JSON")?;

    let request = SignedRequest::sign(&keypair, &salt, body);
    println!("{}", request.to_json()?);
    Ok(())
}
