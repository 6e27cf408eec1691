//! The ledger itself: an append-only, hash-linked sequence of sealed blocks,
//! plus the star-ownership submission flow layered on top of append.

use crate::clock::{Clock, SystemClock};
use crate::constants::{GENESIS_DATA, VALIDATION_WINDOW_SECS};
use crate::error::{AppendError, DecodeError, SubmissionError};
use crate::signature::{Ed25519Verifier, SignatureVerifier};
use crate::star::{OwnershipMessage, Star, StarClaim};
use crate::{Block, Hash, UnsealedBlock, GENESIS_PREVIOUS_HASH};
use parking_lot::RwLock;
use serde_json::json;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// How long a signed ownership message stays acceptable, in seconds.
    pub validation_window_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            validation_window_secs: VALIDATION_WINDOW_SECS,
        }
    }
}

/// A structural problem found while walking the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finding {
    SelfValidation { height: u64 },
    BrokenLink { height: u64 },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::SelfValidation { height } => {
                write!(f, "Block at height {height} failed self-validation.")
            }
            Finding::BrokenLink { height } => {
                write!(f, "Block at height {height} has a broken link to its predecessor.")
            }
        }
    }
}

/// Result of a successful append. The block is in the chain whatever the
/// findings say; they describe the chain as it stands after the append.
#[derive(Clone, Debug)]
pub struct Appended {
    pub block: Block,
    pub findings: Vec<Finding>,
}

pub struct Chain<V = Ed25519Verifier, C = SystemClock> {
    blocks: RwLock<Vec<Block>>,
    verifier: V,
    clock: C,
    config: ChainConfig,
}

impl Chain {
    /// A chain using Ed25519 wallet signatures and the system clock.
    pub fn new() -> Result<Self, AppendError> {
        Self::with_parts(Ed25519Verifier, SystemClock, ChainConfig::default())
    }
}

impl<V: SignatureVerifier, C: Clock> Chain<V, C> {
    /// Build a chain and seal its genesis block.
    pub fn with_parts(verifier: V, clock: C, config: ChainConfig) -> Result<Self, AppendError> {
        let chain = Self {
            blocks: RwLock::new(Vec::new()),
            verifier,
            clock,
            config,
        };
        chain.initialize_if_empty()?;
        Ok(chain)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Ensure a genesis block exists. Idempotent.
    pub fn initialize_if_empty(&self) -> Result<(), AppendError> {
        let mut blocks = self.blocks.write();
        if blocks.is_empty() {
            let genesis = UnsealedBlock::new(json!({ "data": GENESIS_DATA }));
            let block = self.push_sealed(&mut blocks, genesis)?;
            info!(hash = %hex::encode(block.hash()), "genesis block sealed");
        }
        Ok(())
    }

    /// Index of the tip, or -1 before genesis.
    pub fn height(&self) -> i64 {
        self.blocks.read().len() as i64 - 1
    }

    /// Snapshot of every sealed block, genesis first.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    /// Seal `block` onto the tip. The whole chain is re-validated afterwards
    /// and any findings are returned with the block; they never undo the append.
    pub fn append(&self, block: UnsealedBlock) -> Result<Appended, AppendError> {
        let mut blocks = self.blocks.write();
        let block = self.push_sealed(&mut blocks, block)?;
        let findings = validate_blocks(&blocks);
        drop(blocks);

        info!(
            height = block.height(),
            hash = %hex::encode(block.hash()),
            "block appended"
        );
        for finding in &findings {
            warn!("{finding}");
        }
        Ok(Appended { block, findings })
    }

    fn push_sealed(
        &self,
        blocks: &mut Vec<Block>,
        block: UnsealedBlock,
    ) -> Result<Block, AppendError> {
        let previous_hash = blocks
            .last()
            .map(|b| *b.hash())
            .unwrap_or(GENESIS_PREVIOUS_HASH);
        let height = blocks.len() as u64;
        let sealed = block.seal(height, previous_hash, self.clock.now())?;
        blocks.push(sealed.clone());
        Ok(sealed)
    }

    /// The challenge `address` must sign before submitting a star.
    pub fn request_ownership_message(&self, address: &str) -> String {
        OwnershipMessage::new(address, self.clock.now()).to_string()
    }

    /// Record a star for `address` once `message` is shown to be fresh and
    /// signed by the wallet.
    pub fn submit_star(
        &self,
        address: &str,
        message: &str,
        signature: &str,
        star: Star,
    ) -> Result<Appended, SubmissionError> {
        let challenge = OwnershipMessage::parse(message).inspect_err(|e| {
            warn!(%address, "star submission rejected: {e}");
        })?;
        if challenge.address != address {
            warn!(%address, message_address = %challenge.address, "star submission rejected: address mismatch");
            return Err(SubmissionError::AddressMismatch {
                expected: challenge.address,
                got: address.to_string(),
            });
        }

        let now = self.clock.now();
        if challenge.timestamp > now {
            warn!(%address, timestamp = challenge.timestamp, now, "star submission rejected: message from the future");
            return Err(SubmissionError::FromTheFuture {
                timestamp: challenge.timestamp,
                now,
            });
        }
        let elapsed = now - challenge.timestamp;
        let window = self.config.validation_window_secs;
        debug!(%address, elapsed, window, "checking message freshness");
        if elapsed >= window {
            warn!(%address, elapsed, "star submission rejected: message expired");
            return Err(SubmissionError::Expired { elapsed, window });
        }

        if !self.verifier.verify(message, address, signature) {
            warn!(%address, "star submission rejected: invalid signature");
            return Err(SubmissionError::InvalidSignature(address.to_string()));
        }

        let claim = StarClaim {
            address: address.to_string(),
            signature: signature.to_string(),
            message: message.to_string(),
            star,
        };
        Ok(self.append(UnsealedBlock::from_payload(&claim)?)?)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.blocks.read().iter().find(|b| b.hash() == hash).cloned()
    }

    pub fn block_by_height(&self, height: u64) -> Option<Block> {
        self.blocks
            .read()
            .iter()
            .find(|b| b.height() == height)
            .cloned()
    }

    /// Every star claimed by `address`, in chain order. Blocks owned by other
    /// addresses (and genesis) are skipped; only undecodable bodies fail.
    pub fn stars_by_wallet_address(&self, address: &str) -> Result<Vec<StarClaim>, DecodeError> {
        let blocks = self.blocks.read();
        let mut stars = Vec::new();
        for block in blocks.iter() {
            let body: serde_json::Value = block.decode_body()?;
            if body.get("address").and_then(|a| a.as_str()) != Some(address) {
                continue;
            }
            stars.push(serde_json::from_value(body)?);
        }
        Ok(stars)
    }

    /// Walk the chain from genesis to tip collecting every structural problem.
    pub fn validate_chain(&self) -> Vec<Finding> {
        validate_blocks(&self.blocks.read())
    }
}

fn validate_blocks(blocks: &[Block]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if !block.validate() {
            findings.push(Finding::SelfValidation {
                height: block.height(),
            });
        }
        let expected_prev = match i {
            0 => &GENESIS_PREVIOUS_HASH,
            _ => blocks[i - 1].hash(),
        };
        if block.previous_hash() != expected_prev {
            findings.push(Finding::BrokenLink {
                height: block.height(),
            });
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signature::{address_of, sign_message};
    use ed25519_dalek::SigningKey;

    const T: u64 = 1_700_000_000;

    fn chain_at(now: u64) -> Chain<Ed25519Verifier, ManualClock> {
        Chain::with_parts(Ed25519Verifier, ManualClock::new(now), ChainConfig::default()).unwrap()
    }

    fn orion() -> Star {
        Star {
            ra: "5h 35m".into(),
            dec: "-5° 23'".into(),
            mag: None,
            cen: None,
            story: "Orion".into(),
        }
    }

    /// Always says yes; lets gate-order tests focus on message handling.
    struct AcceptAll;

    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _: &str, _: &str, _: &str) -> bool {
            true
        }
    }

    #[test]
    fn genesis_invariant() {
        let chain = chain_at(T);
        assert_eq!(chain.height(), 0);
        let blocks = chain.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].height(), 0);
        assert_eq!(blocks[0].timestamp(), T);
        assert_eq!(blocks[0].previous_hash(), &GENESIS_PREVIOUS_HASH);
        let body: serde_json::Value = blocks[0].decode_body().unwrap();
        assert_eq!(body, json!({"data": "Genesis Block"}));
        assert!(chain.validate_chain().is_empty());
    }

    #[test]
    fn initialize_is_idempotent() {
        let chain = chain_at(T);
        let genesis = chain.blocks()[0].clone();
        chain.initialize_if_empty().unwrap();
        chain.initialize_if_empty().unwrap();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.blocks()[0], genesis);
    }

    #[test]
    fn append_links_blocks() {
        let chain = chain_at(T);
        for i in 0..10u64 {
            chain.clock().advance(1);
            let appended = chain.append(UnsealedBlock::new(json!({ "n": i }))).unwrap();
            assert!(appended.findings.is_empty());
            assert_eq!(appended.block.height(), i + 1);
            assert_eq!(appended.block.timestamp(), T + i + 1);
        }
        assert_eq!(chain.height(), 10);
        let blocks = chain.blocks();
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].previous_hash(), blocks[i - 1].hash());
            assert_eq!(blocks[i].height(), i as u64);
        }
    }

    #[test]
    fn append_reports_but_keeps_existing_damage() {
        let chain = chain_at(T);
        chain.append(UnsealedBlock::new(json!("one"))).unwrap();
        chain.blocks.write()[1].timestamp += 1;

        let appended = chain.append(UnsealedBlock::new(json!("two"))).unwrap();
        assert_eq!(appended.block.height(), 2);
        assert_eq!(chain.height(), 2);
        assert_eq!(
            appended.findings,
            vec![Finding::SelfValidation { height: 1 }]
        );
    }

    #[test]
    fn broken_link_is_reported_once() {
        let chain = chain_at(T);
        chain.append(UnsealedBlock::new(json!("one"))).unwrap();
        chain.blocks.write()[1].previous_hash = [9u8; 32];
        // Re-seal so only the link is wrong, not the block's own hash.
        {
            let mut blocks = chain.blocks.write();
            blocks[1].hash = blocks[1].compute_hash();
        }
        let findings = chain.validate_chain();
        assert_eq!(findings, vec![Finding::BrokenLink { height: 1 }]);
        assert_eq!(
            findings[0].to_string(),
            "Block at height 1 has a broken link to its predecessor."
        );
    }

    #[test]
    fn corrupted_previous_hash_fails_link_and_self_check() {
        let chain = chain_at(T);
        chain.append(UnsealedBlock::new(json!("one"))).unwrap();
        chain.blocks.write()[1].previous_hash = [9u8; 32];
        let findings = chain.validate_chain();
        assert_eq!(
            findings,
            vec![
                Finding::SelfValidation { height: 1 },
                Finding::BrokenLink { height: 1 }
            ]
        );
    }

    #[test]
    fn genesis_with_wrong_sentinel_is_reported() {
        let chain = chain_at(T);
        {
            let mut blocks = chain.blocks.write();
            blocks[0].previous_hash = [1u8; 32];
            blocks[0].hash = blocks[0].compute_hash();
        }
        // Block 1 did not exist yet, so only genesis is affected.
        assert_eq!(chain.validate_chain(), vec![Finding::BrokenLink { height: 0 }]);
    }

    #[test]
    fn validation_does_not_stop_at_first_problem() {
        let chain = chain_at(T);
        for i in 0..4 {
            chain.append(UnsealedBlock::new(json!(i))).unwrap();
        }
        {
            let mut blocks = chain.blocks.write();
            blocks[1].body = hex::encode(b"\"tampered\"");
            blocks[3].timestamp = 0;
        }
        let findings = chain.validate_chain();
        assert_eq!(
            findings,
            vec![
                Finding::SelfValidation { height: 1 },
                Finding::SelfValidation { height: 3 }
            ]
        );
        assert_eq!(
            findings[0].to_string(),
            "Block at height 1 failed self-validation."
        );
    }

    #[test]
    fn lookups_return_none_on_miss() {
        let chain = chain_at(T);
        let appended = chain.append(UnsealedBlock::new(json!("x"))).unwrap();
        assert_eq!(chain.block_by_height(1), Some(appended.block.clone()));
        assert_eq!(chain.block_by_hash(appended.block.hash()), Some(appended.block));
        assert!(chain.block_by_height(2).is_none());
        assert!(chain.block_by_hash(&[0xab; 32]).is_none());
    }

    #[test]
    fn request_message_uses_clock() {
        let chain = chain_at(T);
        assert_eq!(
            chain.request_ownership_message("addr1"),
            format!("addr1:{T}:starRegistry")
        );
    }

    #[test]
    fn submit_star_happy_path() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let address = address_of(&key);
        let chain = chain_at(T);
        let message = chain.request_ownership_message(&address);
        let signature = sign_message(&key, &message);

        chain.clock().advance(10);
        let appended = chain
            .submit_star(&address, &message, &signature, orion())
            .unwrap();
        assert_eq!(appended.block.height(), 1);
        assert_eq!(chain.height(), 1);

        let stars = chain.stars_by_wallet_address(&address).unwrap();
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].star.story, "Orion");
        assert_eq!(stars[0].message, message);
        assert_eq!(stars[0].signature, signature);
    }

    #[test]
    fn freshness_boundary() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        let address = address_of(&key);
        let chain = chain_at(T);
        let message = chain.request_ownership_message(&address);
        let signature = sign_message(&key, &message);

        chain.clock().set(T + 300);
        let err = chain
            .submit_star(&address, &message, &signature, orion())
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Expired {
                elapsed: 300,
                window: 300
            }
        ));
        assert_eq!(chain.height(), 0);

        chain.clock().set(T + 299);
        chain
            .submit_star(&address, &message, &signature, orion())
            .unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn expired_is_reported_before_bad_signature() {
        let chain = chain_at(T);
        let message = chain.request_ownership_message("addr1");
        chain.clock().advance(301);
        let err = chain
            .submit_star("addr1", &message, "not-a-signature", orion())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Expired { .. }));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let thief = SigningKey::from_bytes(&[2u8; 32]);
        let address = address_of(&key);
        let chain = chain_at(T);
        let message = chain.request_ownership_message(&address);
        let signature = sign_message(&thief, &message);
        let err = chain
            .submit_star(&address, &message, &signature, orion())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidSignature(a) if a == address));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn message_checks_run_before_freshness() {
        let chain =
            Chain::with_parts(AcceptAll, ManualClock::new(T), ChainConfig::default()).unwrap();

        let err = chain
            .submit_star("addr1", "addr1:nope:starRegistry", "sig", orion())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedMessage(_)));

        let message = chain.request_ownership_message("addr1");
        let err = chain
            .submit_star("addr2", &message, "sig", orion())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::AddressMismatch { .. }));

        let future = OwnershipMessage::new("addr1", T + 5).to_string();
        let err = chain
            .submit_star("addr1", &future, "sig", orion())
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::FromTheFuture { timestamp, now } if timestamp == T + 5 && now == T
        ));

        chain.submit_star("addr1", &message, "sig", orion()).unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn window_is_configurable() {
        let config = ChainConfig {
            validation_window_secs: 10,
        };
        let chain = Chain::with_parts(AcceptAll, ManualClock::new(T), config).unwrap();
        let message = chain.request_ownership_message("addr1");
        chain.clock().advance(10);
        assert!(matches!(
            chain.submit_star("addr1", &message, "sig", orion()),
            Err(SubmissionError::Expired { window: 10, .. })
        ));
    }

    #[test]
    fn stars_are_filtered_by_owner_in_chain_order() {
        let chain =
            Chain::with_parts(AcceptAll, ManualClock::new(T), ChainConfig::default()).unwrap();
        for (owner, story) in [("alice", "a1"), ("bob", "b1"), ("alice", "a2")] {
            let message = chain.request_ownership_message(owner);
            let star = Star {
                story: story.into(),
                ..orion()
            };
            chain.submit_star(owner, &message, "sig", star).unwrap();
        }
        chain.append(UnsealedBlock::new(json!(["not", "a", "claim"]))).unwrap();

        let alice: Vec<String> = chain
            .stars_by_wallet_address("alice")
            .unwrap()
            .into_iter()
            .map(|c| c.star.story)
            .collect();
        assert_eq!(alice, vec!["a1", "a2"]);
        assert_eq!(chain.stars_by_wallet_address("bob").unwrap().len(), 1);
        assert!(chain.stars_by_wallet_address("carol").unwrap().is_empty());
    }

    #[test]
    fn stars_query_propagates_decode_failures() {
        let chain = chain_at(T);
        chain.append(UnsealedBlock::new(json!("x"))).unwrap();
        chain.blocks.write()[1].body = "not hex".into();
        assert!(matches!(
            chain.stars_by_wallet_address("alice"),
            Err(DecodeError::Hex(_))
        ));
    }
}
