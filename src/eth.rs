use num_bigint::BigUint;
use serde_json::{json, Value};
use thiserror::Error;

/// Canonical USDC contract on Ethereum mainnet.
pub const USDC_CONTRACT: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

/// `keccak256("balanceOf(address)")[..4]`
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

const ADDRESS_HEX_LEN: usize = 40;

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address must be {} hex characters, got {}", ADDRESS_HEX_LEN, .0)]
    BadLength(usize),
    #[error("invalid hex address: {0}")]
    BadHex(#[from] hex::FromHexError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("unexpected hex result: {0}")]
    MissingPrefix(String),
    #[error("invalid hex value: {0}")]
    InvalidHex(String),
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

fn address_bytes(input: &str) -> Result<[u8; 20], AddressError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Empty);
    }
    let body = strip_hex_prefix(trimmed);
    if body.len() != ADDRESS_HEX_LEN {
        return Err(AddressError::BadLength(body.len()));
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body, &mut bytes)?;
    Ok(bytes)
}

/// Validates a 20-byte hex address and returns it lowercase with a `0x` prefix.
pub fn normalize_address(input: &str) -> Result<String, AddressError> {
    address_bytes(input).map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// The normalized address without its `0x` prefix.
pub fn address_data_hex(input: &str) -> Result<String, AddressError> {
    address_bytes(input).map(hex::encode)
}

/// ABI encodes `balanceOf(holder)`: selector followed by the address
/// left-padded to a 32-byte word.
pub fn encode_balance_of_call(holder: &str) -> Result<String, AddressError> {
    let address = address_bytes(holder)?;

    let mut calldata = Vec::with_capacity(4 + 32);
    calldata.extend_from_slice(&BALANCE_OF_SELECTOR);
    calldata.extend_from_slice(&[0u8; 12]);
    calldata.extend_from_slice(&address);

    Ok(format!("0x{}", hex::encode(calldata)))
}

/// `eth_call` params reading `holder`'s balance of `contract` at the latest block.
pub fn balance_of_params(contract: &str, holder: &str) -> Result<Value, AddressError> {
    let contract = normalize_address(contract)?;
    let data = encode_balance_of_call(holder)?;
    Ok(json!([{ "to": contract, "data": data }, "latest"]))
}

/// Decodes a big-endian hex quantity as returned by `eth_call`. `0x` is zero.
pub fn decode_quantity(value: &str) -> Result<BigUint, QuantityError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| QuantityError::MissingPrefix(value.to_string()))?;
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(QuantityError::InvalidHex(value.to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| QuantityError::InvalidHex(value.to_string()))
}
