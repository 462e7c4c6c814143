//! Opaque account addresses.

use {
    serde_derive::{Deserialize, Serialize},
    std::{
        fmt,
        str::FromStr,
        sync::atomic::{AtomicU64, Ordering},
    },
    thiserror::Error,
};

/// Number of bytes in an account address.
pub const ADDRESS_BYTES: usize = 32;

/// The address of an account on the ledger.
#[derive(
    Clone, Copy, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new_from_array(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// A unique address, suitable for locally generated staging buffers and
    /// for tests. Key derivation and signing live outside this crate.
    pub fn new_unique() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let mut bytes = [0; ADDRESS_BYTES];
        let i = COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[0..8].copy_from_slice(&i.to_be_bytes());
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("string decoded to wrong size for address")]
    WrongSize,
    #[error("failed to decode string to address")]
    Invalid,
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseAddressError::Invalid)?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(ParseAddressError::WrongSize);
        }
        let mut address = [0; ADDRESS_BYTES];
        address.copy_from_slice(&bytes);
        Ok(Self(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unique() {
        assert_ne!(Address::new_unique(), Address::new_unique());
    }

    #[test]
    fn test_fromstr() {
        let address = Address::new_unique();
        let display = address.to_string();
        assert_eq!(display.parse::<Address>(), Ok(address));

        let mut too_short = display.clone();
        too_short.truncate(display.len() / 2);
        assert_eq!(
            too_short.parse::<Address>(),
            Err(ParseAddressError::WrongSize)
        );

        let mut bad_alphabet = display;
        bad_alphabet.replace_range(..1, "I");
        assert_eq!(
            bad_alphabet.parse::<Address>(),
            Err(ParseAddressError::Invalid)
        );
    }
}
