//! SPL token account layout check.
//!
//! Layout of a token account (165 bytes):
//! ```text
//! mint(32) owner(32) amount(8) delegate(COption<Pubkey>: 4+32)
//! state(1) is_native(COption<u64>: 4+8) delegated_amount(8)
//! close_authority(COption<Pubkey>: 4+32)
//! ```
//! Token-2022 accounts may be longer; they then carry an account-type
//! discriminator right after the base layout.

/// Size of the base token account layout.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

const STATE_OFFSET: usize = 108;
const ACCOUNT_TYPE_OFFSET: usize = TOKEN_ACCOUNT_LEN;
const ACCOUNT_TYPE_ACCOUNT: u8 = 2;

const STATE_INITIALIZED: u8 = 1;
const STATE_FROZEN: u8 = 2;

/// Returns `true` if `data` decodes as an initialized (or frozen) token account.
pub fn is_initialized_token_account(data: &[u8]) -> bool {
    let layout_ok = match data.len() {
        TOKEN_ACCOUNT_LEN => true,
        len if len > TOKEN_ACCOUNT_LEN => data[ACCOUNT_TYPE_OFFSET] == ACCOUNT_TYPE_ACCOUNT,
        _ => false,
    };
    if !layout_ok {
        return false;
    }
    matches!(data[STATE_OFFSET], STATE_INITIALIZED | STATE_FROZEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_account(state: u8) -> Vec<u8> {
        let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
        data[STATE_OFFSET] = state;
        data
    }

    #[test]
    fn initialized_and_frozen_accepted() {
        assert!(is_initialized_token_account(&token_account(1)));
        assert!(is_initialized_token_account(&token_account(2)));
    }

    #[test]
    fn uninitialized_or_garbage_state_rejected() {
        assert!(!is_initialized_token_account(&token_account(0)));
        assert!(!is_initialized_token_account(&token_account(9)));
    }

    #[test]
    fn wrong_size_rejected() {
        assert!(!is_initialized_token_account(&[1u8; 100]));
        assert!(!is_initialized_token_account(&[]));
    }

    #[test]
    fn extended_layout_requires_account_type() {
        let mut data = token_account(1);
        data.push(ACCOUNT_TYPE_ACCOUNT);
        data.extend_from_slice(&[0u8; 10]);
        assert!(is_initialized_token_account(&data));

        data[ACCOUNT_TYPE_OFFSET] = 1; // mint discriminator
        assert!(!is_initialized_token_account(&data));
    }
}
