//! Keygen command implementation.

use crate::auth::keys::Keypair;
use crate::control::placement::HostPlacement;
use crate::core::config::Config;
use anyhow::Result;
use clap::Args;

/// Derive a keypair from a passphrase.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Passphrase to derive from.
    #[arg(long)]
    pub passphrase: String,

    /// Also print the secret seed.
    #[arg(long)]
    pub show_secret: bool,
}

/// Run the keygen command.
pub fn run_keygen(args: KeygenArgs, config: &Config) -> Result<()> {
    let keypair = Keypair::derive(&args.passphrase)?;
    let public_key = keypair.public_key();
    let placement = HostPlacement::from_config(&config.auth)?;

    println!("tenant_id:  {}", public_key);
    println!("host:       {}", placement.host_for(&public_key.to_hex()));
    if args.show_secret {
        println!("secret:     {}", hex::encode(keypair.to_seed()));
    }
    Ok(())
}
