use ethers::types::U256;

use crate::constants::{DEFAULT_CONFIRMATIONS, UINT256_MAX};
use crate::lock::Lock;
use crate::state::EndState;

/// §4.F `balance`: what `sender` could withdraw right now if the channel
/// settled immediately. Net of `sender`'s own withdraws and what each side
/// has sent the other off-chain.
///
/// The upstream formula this is grounded on drops a `-` operator between
/// `contract_balance` and `total_withdraw`; the correct formula subtracts
/// both `total_withdraw` and `sender`'s transferred amount before adding
/// back what `receiver` sent `sender`. The two positive terms are summed
/// before the two negative terms are subtracted from that sum, rather than
/// subtracting left to right, since `U256` has no sign and an intermediate
/// `contract_balance − sender_transferred` can dip below zero in a reachable
/// state even though the final result never does.
pub fn balance(sender: &EndState, receiver: &EndState) -> U256 {
    let sender_transferred = transferred_amount(sender);
    let receiver_transferred = transferred_amount(receiver);

    sender
        .contract_balance
        .saturating_add(receiver_transferred)
        .saturating_sub(sender.total_withdraw.saturating_add(sender_transferred))
}

fn transferred_amount(end_state: &EndState) -> U256 {
    end_state.balance_proof.as_ref().map(|proof| proof.transferred_amount).unwrap_or_else(U256::zero)
}

/// §4.F `amount_locked`: total pending across all three lock maps,
/// regardless of secret status.
pub fn amount_locked(end_state: &EndState) -> U256 {
    sum_locks(end_state.locked_locks.values())
        .saturating_add(sum_locks(end_state.unlocked_locks.values().map(|(lock, _)| lock)))
        .saturating_add(sum_locks(end_state.onchain_unlocked_locks.values().map(|(lock, _)| lock)))
}

fn sum_locks<'a>(locks: impl Iterator<Item = &'a Lock>) -> U256 {
    locks.fold(U256::zero(), |acc, lock| acc.saturating_add(lock.amount))
}

/// §4.F `distributable`: the smaller of the room left before
/// `UINT256_MAX` and the funds `sender` actually has free of pending locks.
pub fn distributable(sender: &EndState, receiver: &EndState) -> U256 {
    let transferred = transferred_amount(sender);
    let locked = amount_locked(sender);
    let headroom = UINT256_MAX.saturating_sub(transferred).saturating_sub(locked);
    let unlocked_balance = balance(sender, receiver).saturating_sub(amount_locked(sender));
    headroom.min(unlocked_balance)
}

/// §4.F `batch_unlock_gain`: settlement-time accounting only, expiry
/// intentionally unchecked — valid only once the channel has actually
/// settled. Returns `(from_partner_locks, from_our_locks)`.
pub fn batch_unlock_gain(our_state: &EndState, partner_state: &EndState) -> (U256, U256) {
    let from_partner_locks = sum_locks(partner_state.onchain_unlocked_locks.values().map(|(lock, _)| lock));
    let from_our_locks = sum_locks(our_state.locked_locks.values())
        .saturating_add(sum_locks(our_state.unlocked_locks.values().map(|(lock, _)| lock)));
    (from_partner_locks, from_our_locks)
}

/// Threshold at which the *sender* of a lock may safely consider it expired
/// (extra confirmation margin, since they are the one who would lose funds
/// on a reorg that un-expires it).
pub fn sender_expiration_threshold(expiration: u64) -> u64 {
    expiration + 2 * DEFAULT_CONFIRMATIONS
}

/// Threshold at which the *receiver* of a lock may consider it expired.
pub fn receiver_expiration_threshold(expiration: u64) -> u64 {
    expiration + DEFAULT_CONFIRMATIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_balance_formula_matches_spec() {
        let channel = open_test_channel();
        assert_eq!(balance(&channel.our_state, &channel.partner_state), U256::from(100));
        assert_eq!(balance(&channel.partner_state, &channel.our_state), U256::zero());
    }

    #[test]
    fn test_distributable_excludes_locked_amount() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(30), 100, ethers::types::H256::repeat_byte(9));
        channel.our_state.locked_locks.insert(lock.secrethash, lock);
        assert_eq!(distributable(&channel.our_state, &channel.partner_state), U256::from(70));
    }

    #[test]
    fn test_expiration_thresholds_scale_by_confirmations() {
        assert_eq!(sender_expiration_threshold(100), 100 + 2 * DEFAULT_CONFIRMATIONS);
        assert_eq!(receiver_expiration_threshold(100), 100 + DEFAULT_CONFIRMATIONS);
    }
}
