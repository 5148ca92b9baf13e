//! Walks through a complete first-message exchange between two local parties.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p palaver-demo -- --prekeys 10 --message "hi bob"
//! ```

use anyhow::{bail, ensure, Context};
use palaver_crypto::kdf::{self, HashAlgorithm};
use palaver_crypto::x3dh::{
    associated_data, derive_recipient_secret, derive_sender_secret, generate_nonce,
};
use palaver_crypto::{Bundle, KeyPair, Message, PublicBundle};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the demo.
#[derive(Debug)]
struct Args {
    label: String,
    prekeys: u32,
    message: String,
    hash: HashAlgorithm,
    json: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            label: "palaver".into(),
            prekeys: 100,
            message: "olala".into(),
            hash: HashAlgorithm::default(),
            json: false,
        }
    }
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut raw = raw.into_iter();

    while let Some(arg) = raw.next() {
        let mut value = || raw.next().with_context(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--label" => args.label = value()?,
            "--prekeys" => {
                args.prekeys = value()?.parse().context("--prekeys must be a number")?;
            }
            "--message" => args.message = value()?,
            "--hash" => args.hash = value()?.parse()?,
            "--json" => args.json = true,
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    tracing::info!(
        label = %args.label,
        prekeys = args.prekeys,
        hash = %args.hash,
        "palaver demo starting"
    );

    kdf_self_check(args.hash)?;
    run_exchange(&args)
}

/// Derive twice from fixed inputs and confirm the outputs agree.
fn kdf_self_check(hash: HashAlgorithm) -> anyhow::Result<()> {
    let first = kdf::derive_with(hash, b"Omama", b"Omama", b"Olala", 32)?;
    let second = kdf::derive_with(hash, b"Omama", b"Omama", b"Olala", 32)?;
    ensure!(*first == *second, "KDF output is not deterministic");
    tracing::info!(%hash, okm = %hex::encode(&*first), "KDF self-check passed");
    Ok(())
}

fn run_exchange(args: &Args) -> anyhow::Result<()> {
    let mut rng = OsRng;

    // Bob publishes.
    let bob = Bundle::new(&mut rng)?;
    bob.populate_prekeys(&mut rng, args.prekeys)?;
    let published = serde_json::to_string_pretty(&bob.export_public())?;
    if args.json {
        println!("{published}");
    }

    // Alice fetches, verifies and sends.
    let bob_public: PublicBundle = serde_json::from_str(&published)?;
    ensure!(bob_public.verify(), "Bob's signed prekey did not verify");

    let alice = Bundle::new(&mut rng)?;
    let alice_public = alice.export_public();
    let ephemeral = KeyPair::generate(&mut rng)?;
    let sent = derive_sender_secret(&mut rng, ephemeral, &alice, &bob_public, &args.label)?;

    let ad = associated_data(&alice_public.identity_key, &bob_public.identity_key);
    let message = Message::construct(
        &alice_public.identity_key,
        &sent.ephemeral_public,
        sent.one_time_prekey_id,
        generate_nonce(&mut rng)?,
        &sent.shared_secret,
        args.message.as_bytes(),
        &ad,
    )?;
    let wire = message.to_bytes();
    tracing::info!(
        bytes = wire.len(),
        one_time_prekey = ?sent.one_time_prekey_id,
        "Alice sent first message"
    );

    // Bob comes online and reads it.
    let received = Message::from_bytes(&wire)?;
    let bob_secret = derive_recipient_secret(
        &received.ephemeral_key,
        &bob,
        &alice_public,
        received.one_time_prekey_id,
        &args.label,
    )?;
    ensure!(bob_secret == sent.shared_secret, "shared secrets differ");

    let bob_ad = associated_data(&received.identity_key, &bob.identity().public_key());
    let plaintext = received.decrypt(&bob_secret, &bob_ad)?;
    let text = String::from_utf8(plaintext.to_vec()).context("plaintext is not UTF-8")?;

    tracing::info!(
        remaining_prekeys = bob.one_time_prekey_count(),
        "Bob decrypted first message"
    );
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        parse_args(list.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults_without_flags() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.label, "palaver");
        assert_eq!(parsed.prekeys, 100);
        assert_eq!(parsed.hash, HashAlgorithm::Sha512);
        assert!(!parsed.json);
    }

    #[test]
    fn parses_all_flags() {
        let parsed = args(&[
            "--label", "chat", "--prekeys", "3", "--message", "hey", "--hash", "sha256", "--json",
        ])
        .unwrap();
        assert_eq!(parsed.label, "chat");
        assert_eq!(parsed.prekeys, 3);
        assert_eq!(parsed.message, "hey");
        assert_eq!(parsed.hash, HashAlgorithm::Sha256);
        assert!(parsed.json);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&["--prekeys", "many"]).is_err());
        assert!(args(&["--label"]).is_err());
        assert!(args(&["--verbose"]).is_err());
        assert!(args(&["--hash", "md5"]).is_err());
    }

    #[test]
    fn exchange_runs_end_to_end() {
        let parsed = args(&["--prekeys", "2", "--message", "hello"]).unwrap();
        kdf_self_check(parsed.hash).unwrap();
        run_exchange(&parsed).unwrap();
    }
}
