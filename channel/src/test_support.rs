//! Fixtures shared by the module test suites. Not part of the public API.

use ethers::signers::LocalWallet;
use ethers::types::{Address, H256, U256};

use crate::balance_proof::{hash_balance_data, pack_balance_proof, BalanceProofState};
use crate::identity::ChannelIdentity;
use crate::state::{ChannelState, EndState};

pub fn test_identity() -> ChannelIdentity {
    ChannelIdentity::new(U256::one(), Address::repeat_byte(0x33), U256::one())
}

/// A channel with our side funded for 100 and the partner unfunded, open,
/// with `reveal_timeout` comfortably below `settle_timeout`.
pub fn open_test_channel() -> ChannelState {
    let our = EndState::new(Address::repeat_byte(0x11), U256::from(100));
    let partner = EndState::new(Address::repeat_byte(0x22), U256::zero());
    ChannelState::new(test_identity(), our, partner, Address::repeat_byte(0x44), 5, 10, U256::zero()).unwrap()
}

pub fn partner_wallet() -> LocalWallet {
    LocalWallet::new(&mut rand::thread_rng())
}

/// Builds a signed balance proof against [`test_identity`]. `_sender` names
/// whose perspective the proof is written from; it does not need to match
/// `wallet`'s address for the validation-rejection tests this feeds, which
/// fail before the signature is ever checked.
pub fn signed_proof_for(
    _sender: &EndState,
    nonce: U256,
    transferred_amount: U256,
    locked_amount: U256,
    locksroot: H256,
    wallet: &LocalWallet,
) -> BalanceProofState {
    let identity = test_identity();
    let message_hash = H256::zero();
    let balance_hash = hash_balance_data(transferred_amount, locked_amount, locksroot);
    let packed = pack_balance_proof(nonce, balance_hash, message_hash, identity);
    let signature = crate::crypto::sign(&packed, wallet);

    let mut signature_bytes = [0u8; 65];
    signature_bytes.copy_from_slice(&signature.to_vec());

    BalanceProofState {
        nonce,
        transferred_amount,
        locked_amount,
        locksroot,
        channel_identity: identity,
        message_hash,
        signature: Some(signature_bytes),
    }
}
