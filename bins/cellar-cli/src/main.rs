//! cellar-cli — offline helper for Cellar wallets and givers.
//!
//! Generates key pairs and derives contract addresses, state-inits and code
//! hashes for every supported wallet and giver version without touching the
//! network.

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use cellar_core::cell::{Cell, boc};
use cellar_core::crypto::{KeyPair, PublicKey};
use cellar_core::models::StateInit;
use cellar_giver::{GiverV1, GiverV2};
use cellar_wallet::{EverWallet, HighloadWalletV2, WalletProtocol, WalletV3};

use crate::config::Config;

/// Cellar command-line interface.
#[derive(Parser)]
#[command(name = "cellar-cli")]
#[command(version, about = "Wallet addresses and state-inits for cell-based chains.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 key pair.
    Keygen(KeygenArgs),
    /// Print the deployment address of a contract.
    Address(ContractArgs),
    /// Print the state-init (base64 BOC) and address of a contract.
    StateInit(ContractArgs),
    /// Print the code hash of a contract version.
    CodeHash(CodeHashArgs),
    /// Print the effective configuration.
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Version {
    Ever,
    V3,
    Highload,
    GiverV1,
    GiverV2,
}

#[derive(Args)]
struct KeygenArgs {
    /// Where to write the key file (default: $CELLAR_KEY_FILE or ~/.cellar/keypair.json).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Overwrite an existing key file.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ContractArgs {
    /// Contract version.
    #[arg(long = "version", value_enum)]
    version: Version,

    /// Hex-encoded owner public key. Read from the key file when omitted.
    #[arg(long)]
    pubkey: Option<String>,

    /// Key file to read the public key from.
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Workchain id (default: $CELLAR_WORKCHAIN or 0).
    #[arg(short, long, allow_hyphen_values = true)]
    workchain: Option<i32>,

    /// Subwallet id for v3 and highload wallets.
    #[arg(long)]
    wallet_id: Option<u32>,
}

#[derive(Args)]
struct CodeHashArgs {
    /// Contract version.
    #[arg(long = "version", value_enum)]
    version: Version,
}

/// Key pair as stored on disk. Wiped from memory on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFile {
    public: String,
    secret: String,
}

#[derive(Serialize)]
struct ContractInfo {
    version: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_init: Option<String>,
    code_hash: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Keygen(args) => keygen(&config, args),
        Commands::Address(args) => contract_info(&config, args, false),
        Commands::StateInit(args) => contract_info(&config, args, true),
        Commands::CodeHash(args) => code_hash(args),
        Commands::Config => show_config(&config),
    }
}

/// Generate a key pair and write it to the key file.
fn keygen(config: &Config, args: KeygenArgs) -> Result<()> {
    let path = args.out.unwrap_or_else(|| config.key_file.clone());
    if path.exists() && !args.force {
        bail!(
            "key file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let keypair = KeyPair::generate();
    let secret = Zeroizing::new(keypair.secret_bytes());
    let file = KeyFile {
        public: keypair.public_key().to_string(),
        secret: hex::encode(&secret[..]),
    };
    let json = Zeroizing::new(serde_json::to_string_pretty(&file)?);

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    fs::write(&path, json.as_bytes())
        .with_context(|| format!("failed to write key file {}", path.display()))?;
    info!(path = %path.display(), "key pair written");

    println!("{}", file.public);
    Ok(())
}

fn read_public_key(path: &Path) -> Result<PublicKey> {
    let raw = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("failed to read key file {}", path.display()))?,
    );
    let file: KeyFile = serde_json::from_str(&raw)
        .with_context(|| format!("malformed key file {}", path.display()))?;
    let keypair = KeyPair::from_secret_hex(&file.secret).context("invalid secret key")?;
    let public = keypair.public_key();
    if public.to_string() != file.public {
        bail!("public key in {} does not match its secret", path.display());
    }
    Ok(public)
}

fn resolve_public_key(config: &Config, args: &ContractArgs) -> Result<Option<PublicKey>> {
    if args.version == Version::GiverV1 {
        return Ok(None);
    }
    let key = match &args.pubkey {
        Some(hex) => PublicKey::from_hex(hex).context("invalid --pubkey")?,
        None => read_public_key(args.key_file.as_ref().unwrap_or(&config.key_file))?,
    };
    Ok(Some(key))
}

fn build_state_init(
    version: Version,
    public_key: Option<&PublicKey>,
    wallet_id: Option<u32>,
) -> Result<StateInit> {
    let key = || public_key.context("a public key is required for this version");
    let state_init = match version {
        Version::Ever => EverWallet.compute_state_init(key()?)?,
        Version::V3 => wallet_id
            .map(WalletV3::new)
            .unwrap_or_default()
            .compute_state_init(key()?)?,
        Version::Highload => wallet_id
            .map(HighloadWalletV2::new)
            .unwrap_or_default()
            .compute_state_init(key()?)?,
        Version::GiverV1 => GiverV1::state_init()?,
        Version::GiverV2 => GiverV2::compute_state_init(key()?)?,
    };
    Ok(state_init)
}

fn version_code(version: Version) -> Result<Cell> {
    let code = match version {
        Version::Ever => EverWallet.code()?,
        Version::V3 => WalletV3::default().code()?,
        Version::Highload => HighloadWalletV2::default().code()?,
        Version::GiverV1 => GiverV1::state_init()?.code,
        Version::GiverV2 => GiverV2::code()?,
    };
    Ok(code)
}

fn version_name(version: Version) -> String {
    version
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

fn contract_info(config: &Config, args: ContractArgs, with_state_init: bool) -> Result<()> {
    let public_key = resolve_public_key(config, &args)?;
    let workchain = args.workchain.unwrap_or(config.wallet.workchain);

    let state_init = build_state_init(args.version, public_key.as_ref(), args.wallet_id)?;
    let address = state_init.compute_address(workchain)?;
    debug!(%address, version = ?args.version, "address computed");

    let info = ContractInfo {
        version: version_name(args.version),
        address: address.to_string(),
        state_init: if with_state_init {
            Some(boc::encode_base64(&state_init.build_cell()?)?)
        } else {
            None
        },
        code_hash: state_init.code.repr_hash().to_string(),
    };

    if with_state_init {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", info.address);
    }
    Ok(())
}

fn code_hash(args: CodeHashArgs) -> Result<()> {
    let code = version_code(args.version)?;
    println!("{}", code.repr_hash());
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let value = serde_json::json!({
        "key_file": config.key_file.display().to_string(),
        "wallet": config.wallet,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
