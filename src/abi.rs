//! Minimal contract ABI: the calls and events MeeBot uses
//!
//! Selectors and topics are keccak hashes of the canonical signatures.
//! Words and quantities decode into `U256`.

use std::str::FromStr;

use alloy_primitives::{keccak256, B256, U256};
use anyhow::{anyhow, bail, Result};

use crate::models::Address;

/// Largest decimals value whose scale `10^decimals` fits in a `U256`
pub const MAX_DECIMALS: u8 = 77;

/// Contract events the ledger follows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Shared by ERC-20 and ERC-721
    Transfer,
    Approval,
    Staked,
    RewardPaid,
}

impl Event {
    pub const ALL: [Event; 4] = [Event::Transfer, Event::Approval, Event::Staked, Event::RewardPaid];

    pub fn signature(&self) -> &'static str {
        match self {
            Event::Transfer => "Transfer(address,address,uint256)",
            Event::Approval => "Approval(address,address,uint256)",
            Event::Staked => "Staked(address,uint256)",
            Event::RewardPaid => "RewardPaid(address,uint256)",
        }
    }

    pub fn topic(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }

    /// Topic as sent in log filters
    pub fn topic_hex(&self) -> String {
        hex_encode(self.topic().as_slice())
    }

    /// Event identified by a log's first topic
    pub fn from_topic(topic: &str) -> Option<Event> {
        let topic = B256::from_str(topic).ok()?;
        Event::ALL.into_iter().find(|e| e.topic() == topic)
    }
}

/// Contract functions callable from the coordinator
#[derive(Clone, Debug, PartialEq)]
pub enum Function {
    BalanceOf(Address),
    RewardRate,
    TokenOfOwnerByIndex(Address, U256),
    Approve(Address, U256),
    Stake(U256),
    GetReward,
    Mint,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::BalanceOf(_) => "balanceOf",
            Function::RewardRate => "rewardRate",
            Function::TokenOfOwnerByIndex(..) => "tokenOfOwnerByIndex",
            Function::Approve(..) => "approve",
            Function::Stake(_) => "stake",
            Function::GetReward => "getReward",
            Function::Mint => "mint",
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            Function::BalanceOf(_) => "balanceOf(address)",
            Function::RewardRate => "rewardRate()",
            Function::TokenOfOwnerByIndex(..) => "tokenOfOwnerByIndex(address,uint256)",
            Function::Approve(..) => "approve(address,uint256)",
            Function::Stake(_) => "stake(uint256)",
            Function::GetReward => "getReward()",
            Function::Mint => "mint()",
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Selector followed by the 32-byte encoded arguments
    pub fn encode(&self) -> Vec<u8> {
        let mut data = self.selector().to_vec();
        match self {
            Function::BalanceOf(owner) => data.extend(encode_address(owner)),
            Function::TokenOfOwnerByIndex(owner, index) => {
                data.extend(encode_address(owner));
                data.extend(encode_uint(*index));
            }
            Function::Approve(spender, amount) => {
                data.extend(encode_address(spender));
                data.extend(encode_uint(*amount));
            }
            Function::Stake(amount) => data.extend(encode_uint(*amount)),
            Function::RewardRate | Function::GetReward | Function::Mint => {}
        }
        data
    }
}

/// A read-only call against a contract
#[derive(Clone, Debug, PartialEq)]
pub struct ContractCall {
    pub contract: Address,
    pub function: Function,
}

impl ContractCall {
    pub fn new(contract: Address, function: Function) -> Self {
        ContractCall { contract, function }
    }
}

fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn encode_uint(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// Decode the first 32-byte word of `data` as an unsigned integer
pub fn decode_uint(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        bail!("return data too short: {} bytes", data.len());
    }
    Ok(U256::from_be_slice(&data[..32]))
}

fn decode_topic(topic: &str) -> Result<[u8; 32]> {
    let mut word = [0u8; 32];
    hex::decode_to_slice(strip_hex(topic), &mut word)
        .map_err(|e| anyhow!("topic is not a 32-byte word: {}", e))?;
    Ok(word)
}

/// Decode an indexed address topic
pub fn decode_address_topic(topic: &str) -> Result<Address> {
    let word = decode_topic(topic)?;
    Ok(alloy_primitives::Address::from_slice(&word[12..]).into())
}

/// Decode an indexed uint256 topic
pub fn decode_uint_topic(topic: &str) -> Result<U256> {
    Ok(U256::from_be_bytes(decode_topic(topic)?))
}

/// Topic for an address filter argument
pub fn address_topic(address: &Address) -> String {
    hex_encode(&encode_address(address))
}

pub fn hex_encode(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    hex::decode(strip_hex(s)).map_err(|e| anyhow!("invalid hex data: {}", e))
}

/// Parse a JSON-RPC quantity such as `0x1bc16d674ec80000`
pub fn parse_quantity(s: &str) -> Result<U256> {
    let digits = strip_hex(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    if digits.len() > 64 {
        bail!("quantity exceeds 32 bytes: {}", s);
    }
    let bytes = if digits.len() % 2 == 0 {
        hex::decode(digits)
    } else {
        hex::decode(format!("0{}", digits))
    }
    .map_err(|e| anyhow!("invalid quantity {}: {}", s, e))?;
    Ok(U256::from_be_slice(&bytes))
}

fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn scale(decimals: u8) -> Result<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| anyhow!("{} decimals is more than a uint256 can scale", decimals))
}

/// Render base units as a decimal string, trimming trailing zeros
pub fn format_units(value: U256, decimals: u8) -> Result<String> {
    if decimals == 0 {
        return Ok(value.to_string());
    }
    let scale = scale(decimals)?;
    let whole = value / scale;
    let fraction = value % scale;
    if fraction.is_zero() {
        return Ok(whole.to_string());
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, fraction.trim_end_matches('0')))
}

/// Parse a decimal amount such as `10.5` into base units
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        bail!("empty amount");
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        bail!("invalid amount {}", amount);
    }
    if fraction.len() > decimals as usize {
        bail!("too many decimal places in {}", amount);
    }
    let parse = |digits: &str| -> Result<U256> {
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }
        U256::from_str(digits).map_err(|_| anyhow!("amount too large: {}", amount))
    };
    let whole = parse(whole)?;
    let fraction = parse(&format!("{:0<width$}", fraction, width = decimals as usize))?;
    whole
        .checked_mul(scale(decimals)?)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| anyhow!("amount too large: {}", amount))
}
