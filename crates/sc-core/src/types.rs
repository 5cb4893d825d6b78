use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Amount in the smallest currency unit.
pub type Amount = i64;

pub const COIN: Amount = 100_000_000;
pub const MAX_MONEY: Amount = 21_000_000 * COIN;

/// True for amounts a balance or output may legally hold.
pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Render an amount as `<units>.<8 decimals>`.
pub fn format_money(value: Amount) -> String {
    let abs = value.unsigned_abs();
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}.{:08}", sign, abs / COIN as u64, abs % COIN as u64)
}

/// 256-bit opaque value used for sidechain ids, tx hashes and block hashes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Uint256(pub [u8; 32]);

pub type ScId = Uint256;
pub type TxHash = Uint256;
pub type BlockHash = Uint256;

impl Uint256 {
    pub const ZERO: Uint256 = Uint256([0u8; 32]);

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = slice.try_into().ok()?;
        Some(Uint256(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint256({})", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseUint256Error {
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex digit: {0}")]
    InvalidHex(String),
}

impl FromStr for Uint256 {
    type Err = ParseUint256Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(ParseUint256Error::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ParseUint256Error::InvalidHex(e.to_string()))?;
        Ok(Uint256(bytes))
    }
}

/// Double SHA-256, the hash used for transaction and block ids.
pub fn double_sha256(data: &[u8]) -> Uint256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Uint256(out)
}
