//! Bridge program instruction codec
//!
//! Instruction data is a one-byte discriminant followed by the borsh encoding
//! of the instruction arguments. Only the three deposit kinds carry transfers;
//! the remaining kinds are administrative or withdrawal calls.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::DecodeError;

/// Offset of the discriminant byte in instruction data
pub const DISCRIMINANT_INDEX: usize = 0;

/// Account positions inside a `DepositNative` instruction
pub mod native_accounts {
    pub const BRIDGE_ADMIN: usize = 0;
    pub const DEPOSIT: usize = 1;
    pub const OWNER: usize = 2;
}

/// Account positions shared by `DepositFT` and `DepositNFT`
pub mod token_accounts {
    pub const BRIDGE_ADMIN: usize = 0;
    pub const MINT: usize = 1;
    pub const OWNER_ASSOC: usize = 2;
    pub const BRIDGE_ASSOC: usize = 3;
    pub const DEPOSIT: usize = 4;
    pub const OWNER: usize = 5;
}

/// Bridge program instruction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BridgeInstruction {
    InitAdmin = 0,
    TransferOwnership = 1,
    DepositNative = 2,
    DepositFT = 3,
    DepositNFT = 4,
    WithdrawNative = 5,
    WithdrawFT = 6,
    WithdrawNFT = 7,
    MintFT = 8,
    MintNFT = 9,
}

impl BridgeInstruction {
    pub fn from_discriminant(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::InitAdmin),
            1 => Some(Self::TransferOwnership),
            2 => Some(Self::DepositNative),
            3 => Some(Self::DepositFT),
            4 => Some(Self::DepositNFT),
            5 => Some(Self::WithdrawNative),
            6 => Some(Self::WithdrawFT),
            7 => Some(Self::WithdrawNFT),
            8 => Some(Self::MintFT),
            9 => Some(Self::MintNFT),
            _ => None,
        }
    }

    /// Read the kind from raw instruction data
    pub fn from_data(data: &[u8]) -> Option<Self> {
        data.get(DISCRIMINANT_INDEX)
            .copied()
            .and_then(Self::from_discriminant)
    }

    pub fn discriminant(self) -> u8 {
        self as u8
    }

    pub fn is_deposit(self) -> bool {
        matches!(
            self,
            Self::DepositNative | Self::DepositFT | Self::DepositNFT
        )
    }

    /// Position of the depositor in the instruction's account list
    pub fn owner_index(self) -> Option<usize> {
        match self {
            Self::DepositNative => Some(native_accounts::OWNER),
            Self::DepositFT | Self::DepositNFT => Some(token_accounts::OWNER),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DepositNativeArgs {
    pub amount: u64,
    pub network_to: String,
    pub receiver_address: String,
    pub seeds: [u8; 32],
    pub nonce: [u8; 32],
    pub bundle_data: Option<Vec<u8>>,
    pub bundle_seed: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DepositFtArgs {
    pub amount: u64,
    pub network_to: String,
    pub receiver_address: String,
    pub seeds: [u8; 32],
    pub nonce: [u8; 32],
    pub bundle_data: Option<Vec<u8>>,
    pub bundle_seed: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DepositNftArgs {
    pub network_to: String,
    pub receiver_address: String,
    pub seeds: [u8; 32],
    pub nonce: [u8; 32],
    pub bundle_data: Option<Vec<u8>>,
    pub bundle_seed: Option<[u8; 32]>,
}

/// Decoded deposit arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositArgs {
    Native(DepositNativeArgs),
    Ft(DepositFtArgs),
    Nft(DepositNftArgs),
}

impl DepositArgs {
    pub fn kind(&self) -> BridgeInstruction {
        match self {
            DepositArgs::Native(_) => BridgeInstruction::DepositNative,
            DepositArgs::Ft(_) => BridgeInstruction::DepositFT,
            DepositArgs::Nft(_) => BridgeInstruction::DepositNFT,
        }
    }

    /// Serialize back to instruction data, discriminant included
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.kind().discriminant()];
        let body = match self {
            DepositArgs::Native(args) => args.try_to_vec(),
            DepositArgs::Ft(args) => args.try_to_vec(),
            DepositArgs::Nft(args) => args.try_to_vec(),
        };
        // Writing into a Vec cannot fail
        out.extend(body.unwrap_or_default());
        out
    }
}

/// Decode deposit arguments of the expected kind from raw instruction data.
///
/// Truncated data, trailing bytes, bad string lengths and invalid UTF-8 all
/// surface as errors.
pub fn decode(kind: BridgeInstruction, raw: &[u8]) -> Result<DepositArgs, DecodeError> {
    match kind {
        BridgeInstruction::DepositNative => decode_native(raw).map(DepositArgs::Native),
        BridgeInstruction::DepositFT => decode_ft(raw).map(DepositArgs::Ft),
        BridgeInstruction::DepositNFT => decode_nft(raw).map(DepositArgs::Nft),
        other => Err(DecodeError::NotDeposit(other.discriminant())),
    }
}

pub fn decode_native(raw: &[u8]) -> Result<DepositNativeArgs, DecodeError> {
    let body = body_of(BridgeInstruction::DepositNative, raw)?;
    DepositNativeArgs::try_from_slice(body).map_err(malformed)
}

pub fn decode_ft(raw: &[u8]) -> Result<DepositFtArgs, DecodeError> {
    let body = body_of(BridgeInstruction::DepositFT, raw)?;
    DepositFtArgs::try_from_slice(body).map_err(malformed)
}

pub fn decode_nft(raw: &[u8]) -> Result<DepositNftArgs, DecodeError> {
    let body = body_of(BridgeInstruction::DepositNFT, raw)?;
    DepositNftArgs::try_from_slice(body).map_err(malformed)
}

/// Check the discriminant and return the argument bytes
fn body_of(kind: BridgeInstruction, raw: &[u8]) -> Result<&[u8], DecodeError> {
    let (&found, body) = raw.split_first().ok_or(DecodeError::Empty)?;
    if BridgeInstruction::from_discriminant(found).is_none() {
        return Err(DecodeError::UnknownDiscriminant(found));
    }
    if found != kind.discriminant() {
        return Err(DecodeError::KindMismatch {
            expected: kind.discriminant(),
            found,
        });
    }
    Ok(body)
}

fn malformed(err: std::io::Error) -> DecodeError {
    DecodeError::Malformed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_args() -> DepositNativeArgs {
        DepositNativeArgs {
            amount: 1_000_000,
            network_to: "ethereum".to_string(),
            receiver_address: "0xabc0000000000000000000000000000000000001".to_string(),
            seeds: [7u8; 32],
            nonce: [9u8; 32],
            bundle_data: Some(vec![1, 2, 3]),
            bundle_seed: Some([4u8; 32]),
        }
    }

    fn ft_args() -> DepositFtArgs {
        DepositFtArgs {
            amount: u64::MAX,
            network_to: "near".to_string(),
            receiver_address: "alice.near".to_string(),
            seeds: [3u8; 32],
            nonce: [5u8; 32],
            bundle_data: Some(vec![]),
            bundle_seed: None,
        }
    }

    fn nft_args() -> DepositNftArgs {
        DepositNftArgs {
            network_to: "polygon".to_string(),
            receiver_address: "0xdef".to_string(),
            seeds: [1u8; 32],
            nonce: [2u8; 32],
            bundle_data: None,
            bundle_seed: None,
        }
    }

    #[test]
    fn test_discriminant_table() {
        for value in 0u8..=9 {
            let kind = BridgeInstruction::from_discriminant(value).unwrap();
            assert_eq!(kind.discriminant(), value);
        }
        assert!(BridgeInstruction::from_discriminant(10).is_none());
        assert!(BridgeInstruction::from_discriminant(255).is_none());
    }

    #[test]
    fn test_only_deposits_have_owner() {
        assert_eq!(BridgeInstruction::DepositNative.owner_index(), Some(2));
        assert_eq!(BridgeInstruction::DepositFT.owner_index(), Some(5));
        assert_eq!(BridgeInstruction::DepositNFT.owner_index(), Some(5));
        assert!(BridgeInstruction::WithdrawFT.owner_index().is_none());
        assert!(!BridgeInstruction::MintNFT.is_deposit());
    }

    #[test]
    fn test_round_trip_all_variants() {
        let cases = vec![
            DepositArgs::Native(native_args()),
            DepositArgs::Ft(ft_args()),
            DepositArgs::Nft(nft_args()),
        ];

        for args in cases {
            let raw = args.encode();
            assert_eq!(raw[DISCRIMINANT_INDEX], args.kind().discriminant());
            assert_eq!(decode(args.kind(), &raw).unwrap(), args);
        }
    }

    #[test]
    fn test_every_truncation_fails() {
        for args in [
            DepositArgs::Native(native_args()),
            DepositArgs::Ft(ft_args()),
            DepositArgs::Nft(nft_args()),
        ] {
            let raw = args.encode();
            for len in 0..raw.len() {
                assert!(
                    decode(args.kind(), &raw[..len]).is_err(),
                    "prefix of length {} decoded",
                    len
                );
            }
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut raw = DepositArgs::Nft(nft_args()).encode();
        raw.push(0);
        assert!(matches!(
            decode(BridgeInstruction::DepositNFT, &raw),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(
            decode(BridgeInstruction::DepositNative, &[]),
            Err(DecodeError::Empty)
        );
        assert_eq!(
            decode(BridgeInstruction::DepositNative, &[42, 0, 0]),
            Err(DecodeError::UnknownDiscriminant(42))
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let raw = DepositArgs::Native(native_args()).encode();
        assert_eq!(
            decode(BridgeInstruction::DepositFT, &raw),
            Err(DecodeError::KindMismatch {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_non_deposit_kind() {
        assert_eq!(
            decode(BridgeInstruction::WithdrawNative, &[5, 1, 2]),
            Err(DecodeError::NotDeposit(5))
        );
    }

    #[test]
    fn test_oversized_string_length_fails() {
        // amount, then a string length far beyond the buffer
        let mut raw = vec![BridgeInstruction::DepositNative.discriminant()];
        raw.extend_from_slice(&10u64.to_le_bytes());
        raw.extend_from_slice(&u32::MAX.to_le_bytes());
        raw.extend_from_slice(b"eth");
        assert!(decode(BridgeInstruction::DepositNative, &raw).is_err());
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let mut raw = vec![BridgeInstruction::DepositNFT.discriminant()];
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&[0xff, 0xfe]);
        assert!(decode(BridgeInstruction::DepositNFT, &raw).is_err());
    }
}
