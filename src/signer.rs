//! Wallet signer abstraction
//!
//! Wraps a wallet's signing capability into the fixed shape the messaging
//! backend requires: identity lookup, message signing, chain id. Supplied by
//! the caller per initialize call; the initializer never retains it.

use async_trait::async_trait;
use std::fmt;

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

/// Signer errors
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Signing rejected: {0}")]
    Rejected(String),

    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
}

/// Lowercase 0x-prefixed 40-hex-digit account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Parse and normalize an identifier.
    ///
    /// Accepts any case, stores lowercase. Rejects anything that is not
    /// `0x` followed by exactly 40 hex digits.
    pub fn parse(raw: &str) -> SignerResult<Self> {
        let lowered = raw.trim().to_lowercase();
        let hex_part = lowered
            .strip_prefix("0x")
            .ok_or_else(|| SignerError::InvalidIdentifier(raw.to_string()))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SignerError::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet signing capability.
///
/// Implementations bridge to a concrete wallet (hardware, browser extension,
/// keystore). `StaticSigner` provides a canned in-memory implementation for
/// tests and embedding.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account identifier this signer controls
    async fn identifier(&self) -> SignerResult<Identifier>;

    /// Sign an arbitrary message, returning the raw signature bytes
    async fn sign_message(&self, message: &[u8]) -> SignerResult<Vec<u8>>;

    /// Chain id the wallet is connected to
    fn chain_id(&self) -> u64;
}

/// In-memory signer with a fixed identity and deterministic signature.
///
/// Suitable for tests and for embedders that hold raw key material
/// elsewhere and only need the shape of the capability.
#[derive(Debug, Clone)]
pub struct StaticSigner {
    identifier: Identifier,
    chain_id: u64,
}

impl StaticSigner {
    pub fn new(identifier: Identifier, chain_id: u64) -> Self {
        Self {
            identifier,
            chain_id,
        }
    }
}

#[async_trait]
impl Signer for StaticSigner {
    async fn identifier(&self) -> SignerResult<Identifier> {
        Ok(self.identifier.clone())
    }

    async fn sign_message(&self, message: &[u8]) -> SignerResult<Vec<u8>> {
        // Deterministic placeholder signature: identifier bytes over the
        // message digest length. Real deployments implement Signer against
        // an actual wallet.
        let mut signature = self.identifier.as_str().as_bytes().to_vec();
        signature.extend_from_slice(&(message.len() as u64).to_le_bytes());
        Ok(signature)
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
