use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use hex::FromHex;
use rand::rngs::OsRng;
use registry_core::signature::{address_of, sign_message};
use registry_core::Star;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_NODE: &str = "http://127.0.0.1:8000";

#[derive(Parser, Debug)]
#[command(name = "registry-cli")]
#[command(about = "CLI client for the star registry node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a wallet key and print its address
    Keygen,
    /// Ask the node for an ownership message to sign
    Request {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: String,
        #[arg(long)]
        address: String,
    },
    /// Sign a message with a wallet key
    Sign {
        /// Hex-encoded 32-byte secret key
        #[arg(long)]
        secret: String,
        #[arg(long)]
        message: String,
    },
    /// Request, sign and submit a star in one go
    Submit {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: String,
        /// Hex-encoded 32-byte secret key
        #[arg(long)]
        secret: String,
        #[arg(long, allow_hyphen_values = true)]
        ra: String,
        #[arg(long, allow_hyphen_values = true)]
        dec: String,
        #[arg(long)]
        mag: Option<String>,
        #[arg(long)]
        cen: Option<String>,
        #[arg(long)]
        story: String,
    },
    /// List the stars owned by an address
    Stars {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: String,
        #[arg(long)]
        address: String,
    },
    /// Fetch a block by height or hash
    Block {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: String,
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        height: Option<u64>,
        #[arg(long)]
        hash: Option<String>,
    },
    /// Ask the node to validate its chain
    Validate {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: String,
    },
}

#[derive(Serialize)]
struct Submission<'a> {
    address: &'a str,
    message: &'a str,
    signature: &'a str,
    star: Star,
}

fn signing_key(secret: &str) -> Result<SigningKey> {
    let bytes = <[u8; 32]>::from_hex(secret).context("secret must be 64 hex characters")?;
    Ok(SigningKey::from_bytes(&bytes))
}

async fn print_response(res: reqwest::Response) -> Result<Value> {
    let status = res.status();
    let body: Value = res.json().await?;
    println!("status: {}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(body)
}

async fn request_message(client: &reqwest::Client, node: &str, address: &str) -> Result<String> {
    let res = client
        .post(format!("{node}/requestValidation"))
        .json(&serde_json::json!({ "address": address }))
        .send()
        .await?;
    let status = res.status();
    let body: Value = res.json().await?;
    match body.as_str() {
        Some(message) if status.is_success() => Ok(message.to_string()),
        _ => bail!("node refused ownership message ({status}): {body}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Keygen => {
            let key = SigningKey::generate(&mut OsRng);
            println!("secret:  {}", hex::encode(key.to_bytes()));
            println!("address: {}", address_of(&key));
        }
        Command::Request { node, address } => {
            println!("{}", request_message(&client, &node, &address).await?);
        }
        Command::Sign { secret, message } => {
            println!("{}", sign_message(&signing_key(&secret)?, &message));
        }
        Command::Submit {
            node,
            secret,
            ra,
            dec,
            mag,
            cen,
            story,
        } => {
            let key = signing_key(&secret)?;
            let address = address_of(&key);
            let message = request_message(&client, &node, &address).await?;
            debug!(%message, "signing ownership message");
            let signature = sign_message(&key, &message);
            let submission = Submission {
                address: &address,
                message: &message,
                signature: &signature,
                star: Star {
                    ra,
                    dec,
                    mag,
                    cen,
                    story,
                },
            };
            let res = client
                .post(format!("{node}/submitstar"))
                .json(&submission)
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Stars { node, address } => {
            let res = client.get(format!("{node}/blocks/{address}")).send().await?;
            print_response(res).await?;
        }
        Command::Block { node, height, hash } => {
            let url = match (height, hash) {
                (Some(height), _) => format!("{node}/block/height/{height}"),
                (None, Some(hash)) => format!("{node}/block/hash/{hash}"),
                (None, None) => bail!("pass --height or --hash"),
            };
            let res = client.get(url).send().await?;
            print_response(res).await?;
        }
        Command::Validate { node } => {
            let res = client.get(format!("{node}/chain/validate")).send().await?;
            print_response(res).await?;
        }
    }
    Ok(())
}
