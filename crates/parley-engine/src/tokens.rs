//! Opaque token generation
//!
//! Reservation codes and payment memos are URL-safe random tokens. Codes are
//! opaque to callers; memos additionally carry a uniqueness constraint in the
//! store, so collisions are survivable (the lock redraws) but astronomically
//! unlikely.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Prefix marking reservation codes.
pub const RESERVATION_PREFIX: &str = "RES-";

/// Memo length in bytes of entropy (48 bits → 8 base64 chars).
const MEMO_ENTROPY_BYTES: usize = 6;

/// Reservation-code entropy (72 bits).
const CODE_ENTROPY_BYTES: usize = 9;

fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// A fresh opaque reservation code, e.g. `RES-3q2-8hXo4kM`.
pub fn reservation_code() -> String {
    format!("{}{}", RESERVATION_PREFIX, random_token(CODE_ENTROPY_BYTES))
}

/// A fresh 8-character payment memo.
pub fn payment_memo() -> String {
    random_token(MEMO_ENTROPY_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reservation_codes_carry_prefix_and_entropy() {
        let code = reservation_code();
        assert!(code.starts_with("RES-"));
        assert_eq!(code.len(), 4 + 12); // 9 bytes → 12 base64 chars
    }

    #[test]
    fn memos_are_eight_chars() {
        assert_eq!(payment_memo().len(), 8);
    }

    #[test]
    fn memos_are_url_safe() {
        for _ in 0..100 {
            let memo = payment_memo();
            assert!(memo
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn no_collisions_over_a_large_draw() {
        let memos: HashSet<String> = (0..10_000).map(|_| payment_memo()).collect();
        assert_eq!(memos.len(), 10_000);
    }
}
