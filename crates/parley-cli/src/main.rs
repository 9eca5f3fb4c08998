//! Parley CLI - tooling for the refund authority
//!
//! The authority's private key never touches the escrow service. This tool
//! holds it, encodes refund messages canonically and signs them; the output
//! is exactly what `POST /v1/refund` expects.
//!
//! # Quick Start
//!
//! ```bash
//! parley keygen
//! export PARLEY_AUTHORITY_SEED=<seed_hex>
//! parley sign-refund --receiver alice --amount 200000000 --conversation c1
//! ```

use clap::{Parser, Subcommand};

mod commands;

/// Parley CLI - refund authority tooling
#[derive(Parser)]
#[command(name = "parley")]
#[command(author = "Parley Contributors")]
#[command(version)]
#[command(about = "Sign and verify refunds for escrowed conversations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new authority key pair
    Keygen,

    /// Encode a refund canonically and sign it
    SignRefund {
        /// Hex-encoded 32-byte authority seed
        #[arg(long, env = "PARLEY_AUTHORITY_SEED", hide_env_values = true)]
        seed_hex: String,

        /// Identity receiving the refund
        #[arg(long)]
        receiver: String,

        /// Refund amount in smallest token units
        #[arg(long)]
        amount: String,

        /// Conversation being refunded
        #[arg(long)]
        conversation: String,
    },

    /// Verify a signed refund (JSON from sign-refund) against a public key
    VerifyRefund {
        /// Hex-encoded authority public key
        #[arg(long, env = "PARLEY_AUTHORITY_PUBLIC_KEY")]
        public_key: String,

        /// Signed refund JSON; read from stdin when omitted
        #[arg(long)]
        signed: Option<String>,
    },

    /// Print the SHA-256 digest of a message as signed
    Digest {
        /// The exact message string
        message: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Keygen => commands::keygen()?,
        Commands::SignRefund {
            seed_hex,
            receiver,
            amount,
            conversation,
        } => commands::sign_refund(&seed_hex, &receiver, &amount, &conversation)?,
        Commands::VerifyRefund { public_key, signed } => {
            let signed = match signed {
                Some(signed) => signed,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            commands::verify_refund(&public_key, &signed)?
        }
        Commands::Digest { message } => commands::digest(&message),
    };

    println!("{output}");
    Ok(())
}
