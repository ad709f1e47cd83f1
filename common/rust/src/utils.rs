use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use hex::FromHex;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

pub fn parse_address(address: &str) -> Result<Address, hex::FromHexError> {
    let stripped = address.strip_prefix("0x").unwrap_or(address);
    let bytes = Vec::from_hex(stripped)?;
    Ok(Address::from_slice(&bytes))
}

pub fn format_amount(amount: U256) -> String {
    let ether = amount / U256::from(10).pow(U256::from(18));
    let remainder = amount % U256::from(10).pow(U256::from(18));
    format!("{}.{:018} ETH", ether, remainder)
}

pub fn timestamp_to_datetime(timestamp: u64) -> DateTime<Utc> {
    DateTime::from_utc(chrono::NaiveDateTime::from_timestamp_opt(timestamp as i64, 0).unwrap(), Utc)
}
