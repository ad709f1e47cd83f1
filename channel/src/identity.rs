use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// The immutable triple every balance proof on a channel is bound to.
/// Mismatches against a channel's own identity are unconditionally rejected
/// by the balance-proof validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub chain_id: U256,
    pub token_network_address: Address,
    pub channel_id: U256,
}

impl ChannelIdentity {
    pub fn new(chain_id: U256, token_network_address: Address, channel_id: U256) -> Self {
        Self { chain_id, token_network_address, channel_id }
    }

    /// Packs `chain_id ‖ token_network_address ‖ channel_identifier` as
    /// `32 ‖ 20 ‖ 32` big-endian bytes, the trailing segment of the
    /// balance-proof wire encoding in [`crate::balance_proof::pack_balance_proof`].
    pub fn pack(&self) -> [u8; 84] {
        let mut buf = [0u8; 84];
        let mut chain_id_bytes = [0u8; 32];
        self.chain_id.to_big_endian(&mut chain_id_bytes);
        buf[0..32].copy_from_slice(&chain_id_bytes);
        buf[32..52].copy_from_slice(self.token_network_address.as_bytes());
        let mut channel_id_bytes = [0u8; 32];
        self.channel_id.to_big_endian(&mut channel_id_bytes);
        buf[52..84].copy_from_slice(&channel_id_bytes);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_is_84_bytes_in_order() {
        let identity = ChannelIdentity::new(U256::from(1), Address::repeat_byte(0xab), U256::from(7));
        let packed = identity.pack();
        assert_eq!(&packed[32..52], Address::repeat_byte(0xab).as_bytes());
        assert_eq!(U256::from_big_endian(&packed[52..84]), U256::from(7));
    }
}
