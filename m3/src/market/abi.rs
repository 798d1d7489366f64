//! Contract ABI helpers
//!
//! Only the static types the two contracts use are supported: `address`,
//! `uint256` (up to 128 bits on our side) and `bool`.

use std::fmt;
use std::str::FromStr;

use sha3::{Digest, Keccak256};

use crate::market::MarketError;

pub const WORD_SIZE: usize = 32;

pub type Word = [u8; WORD_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl FromStr for Address {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|_| MarketError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| MarketError::InvalidAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
}

impl Token {
    fn to_word(self) -> Word {
        let mut word = [0u8; WORD_SIZE];
        match self {
            Token::Address(address) => word[12..].copy_from_slice(&address.0),
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        }
        word
    }
}

/// First four bytes of the Keccak-256 of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD_SIZE);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Splits return data into words, requiring at least `expected` of them.
pub fn decode_words(data: &[u8], expected: usize) -> Result<Vec<Word>, MarketError> {
    if data.len() % WORD_SIZE != 0 || data.len() / WORD_SIZE < expected {
        return Err(MarketError::Decode(format!(
            "expected {} words, got {} bytes",
            expected,
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(WORD_SIZE)
        .map(|chunk| {
            let mut word = [0u8; WORD_SIZE];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// `None` when the value needs more than 128 bits.
pub fn word_to_u128(word: &Word) -> Option<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(low))
}

pub fn word_to_address(word: &Word) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Address(bytes)
}

pub fn word_to_bool(word: &Word) -> bool {
    word.iter().any(|b| *b != 0)
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, MarketError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(raw).map_err(|e| MarketError::Decode(format!("bad hex {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_parse_address() {
        let address: Address = "0x5661e7bc2403c7cc08df539e4a8e2972ec256d11".parse().unwrap();
        assert_eq!(address.to_string(), "0x5661e7bc2403c7cc08df539e4a8e2972ec256d11");

        let bare: Address = "5661e7bc2403c7cc08df539e4a8e2972ec256d11".parse().unwrap();
        assert_eq!(address, bare);

        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz61e7bc2403c7cc08df539e4a8e2972ec256d11".parse::<Address>().is_err());
    }

    #[test]
    fn test_encode_call() {
        let to: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        let data = encode_call("transfer(address,uint256)", &[Token::Address(to), Token::Uint(258)]);

        assert_eq!(data.len(), 4 + 2 * WORD_SIZE);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data[4 + 31], 0xff);
        assert!(data[4..4 + 31].iter().all(|b| *b == 0));
        assert_eq!(&data[4 + 62..], &[0x01, 0x02]);
    }

    #[test]
    fn test_decode_words() {
        let mut data = vec![0u8; 2 * WORD_SIZE];
        data[31] = 7;
        data[63] = 1;
        let words = decode_words(&data, 2).unwrap();
        assert_eq!(word_to_u128(&words[0]), Some(7));
        assert!(word_to_bool(&words[1]));

        assert!(decode_words(&data, 3).is_err());
        assert!(decode_words(&data[1..], 1).is_err());
    }

    #[test]
    fn test_word_to_u128_overflow() {
        let mut word = [0u8; WORD_SIZE];
        word[15] = 1;
        assert_eq!(word_to_u128(&word), None);
        word[15] = 0;
        word[16] = 0x80;
        assert_eq!(word_to_u128(&word), Some(1u128 << 127));
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(to_hex(&[0xde, 0xad]), "0xdead");
        assert_eq!(from_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(from_hex("0x").unwrap(), Vec::<u8>::new());
        assert!(from_hex("0xabc").is_err());
    }
}
