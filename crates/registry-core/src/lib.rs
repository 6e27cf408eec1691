pub mod chain;
pub mod clock;
pub mod constants;
pub mod error;
pub mod signature;
pub mod star;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use chain::{Appended, Chain, ChainConfig, Finding};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppendError, DecodeError, SubmissionError};
pub use signature::{Ed25519Verifier, SignatureVerifier};
pub use star::{OwnershipMessage, Star, StarClaim};

pub type Hash = [u8; 32];

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: Hash = [0u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// A block that has its payload but no position in a chain yet.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsealedBlock {
    data: serde_json::Value,
}

impl UnsealedBlock {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data }
    }

    pub fn from_payload<T: Serialize>(payload: &T) -> Result<Self, AppendError> {
        let data = serde_json::to_value(payload).map_err(AppendError::Encode)?;
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Assign position and linkage, encode the payload and compute the hash.
    /// Only the chain's append path calls this.
    pub(crate) fn seal(
        self,
        height: u64,
        previous_hash: Hash,
        timestamp: u64,
    ) -> Result<Block, AppendError> {
        let encoded = serde_json::to_vec(&self.data).map_err(AppendError::Encode)?;
        let mut block = Block {
            height,
            timestamp,
            previous_hash,
            body: hex::encode(encoded),
            hash: [0u8; 32],
        };
        block.hash = block.compute_hash();
        Ok(block)
    }
}

/// Fields covered by a block hash, in hashing order.
#[derive(Serialize)]
struct HashInput<'a> {
    height: u64,
    timestamp: u64,
    previous_hash: String,
    body: &'a str,
}

/// A sealed block. Fields are read-only once the hash has been assigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    timestamp: u64,
    #[serde(with = "hex")]
    previous_hash: Hash,
    #[serde(with = "hex")]
    hash: Hash,
    body: String,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Hex-encoded JSON payload as stored.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let input = HashInput {
            height: self.height,
            timestamp: self.timestamp,
            previous_hash: hex::encode(self.previous_hash),
            body: &self.body,
        };
        // Serializing plain integers and strings cannot fail.
        serde_json::to_vec(&input).unwrap_or_default()
    }

    pub fn compute_hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }

    /// Recompute the hash from the other fields and compare with the stored one.
    pub fn validate(&self) -> bool {
        self.compute_hash() == self.hash
    }

    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let bytes = hex::decode(&self.body)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
