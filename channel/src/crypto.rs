//! Thin re-export of the collaborator functions named in the external
//! interfaces: `recover` and `keccak256`. The channel core never reaches
//! into `sha3`/`ethers::signers` directly outside this module, so the
//! "narrow interface" boundary stays enforceable at a glance.

pub use netchannel_common::crypto::{keccak256, recover, sign, CryptoError};
