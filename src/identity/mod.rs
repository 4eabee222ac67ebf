use std::{fmt, str::FromStr};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

/// AIP-80 prefix carried by exported Ed25519 secrets.
pub const ED25519_PRIVATE_KEY_PREFIX: &str = "ed25519-priv-";

/// Authentication scheme byte appended to the public key before hashing.
const ED25519_SCHEME: u8 = 0x00;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("empty {what}")]
    Empty { what: &'static str },
    #[error("invalid hex in {what}: {source}")]
    InvalidHex {
        what: &'static str,
        source: hex::FromHexError,
    },
    #[error("{what} must be {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// 32-byte ledger account identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    pub const LENGTH: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Single-key Ed25519 account: `sha3_256(public_key || 0x00)`.
    pub fn from_ed25519_public_key(public_key: &VerifyingKey) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(public_key.as_bytes());
        hasher.update([ED25519_SCHEME]);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    /// Accepts long and short forms (`0x1` is `0x00..01`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() {
            return Err(IdentityError::Empty { what: "address" });
        }
        if digits.len() > Self::LENGTH * 2 {
            return Err(IdentityError::InvalidLength {
                what: "address",
                expected: Self::LENGTH,
                actual: (digits.len() + 1) / 2,
            });
        }
        let padded = format!("{:0>64}", digits);
        let bytes = hex::decode(padded).map_err(|source| IdentityError::InvalidHex {
            what: "address",
            source,
        })?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// Ed25519 key material together with the account address it controls.
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    /// Parses `ed25519-priv-0x<hex>`, `0x<hex>` or bare hex.
    pub fn from_private_key(secret: &str) -> Result<Self, IdentityError> {
        let secret = secret.trim();
        let secret = secret
            .strip_prefix(ED25519_PRIVATE_KEY_PREFIX)
            .unwrap_or(secret);
        let digits = secret.strip_prefix("0x").unwrap_or(secret);
        if digits.is_empty() {
            return Err(IdentityError::Empty { what: "private key" });
        }
        let bytes = hex::decode(digits).map_err(|source| IdentityError::InvalidHex {
            what: "private key",
            source,
        })?;
        let sk: [u8; 32] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::InvalidLength {
                    what: "private key",
                    expected: 32,
                    actual: bytes.len(),
                })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&sk)))
    }

    pub fn generate() -> Self {
        let mut sk_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut sk_bytes);
        Self::from_signing_key(SigningKey::from_bytes(&sk_bytes))
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = Address::from_ed25519_public_key(&key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public_key().as_bytes()))
    }

    /// Exported in AIP-80 form so it round-trips through [`Self::from_private_key`].
    pub fn private_key_string(&self) -> String {
        format!(
            "{}0x{}",
            ED25519_PRIVATE_KEY_PREFIX,
            hex::encode(self.key.to_bytes())
        )
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
