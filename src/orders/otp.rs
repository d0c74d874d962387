//! Pickup OTP generation and verification
//!
//! A 4-digit code is issued when an order becomes READY. Only a keyed hash of
//! the code is persisted; the plaintext goes to the customer. The merchant
//! types the code the customer shows at pickup and the server compares it in
//! constant time.

use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Number of digits in a pickup code
pub const OTP_DIGITS: usize = 4;

/// Issues codes and checks them against stored hashes
pub struct OtpIssuer {
    secret: Vec<u8>,
    rng: Mutex<ChaCha20Rng>,
}

impl OtpIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }

    /// Deterministic issuer for tests
    #[cfg(test)]
    pub fn seeded(secret: &str, seed: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Generate a fresh code, returns `(plaintext, hash)`
    pub fn issue(&self, order_id: Uuid) -> (String, String) {
        let value: u16 = self.rng.lock().gen_range(0..10_000);
        let code = format!("{:0width$}", value, width = OTP_DIGITS);
        let hash = self.hash(order_id, &code);
        (code, hash)
    }

    /// Keyed hash stored in `orders.otp_hash`
    pub fn hash(&self, order_id: Uuid, code: &str) -> String {
        hex::encode(self.mac(order_id, code).finalize().into_bytes())
    }

    /// Constant-time check of a submitted code against the stored hash
    pub fn verify(&self, order_id: Uuid, code: &str, stored_hash: &str) -> bool {
        let Ok(expected) = hex::decode(stored_hash) else {
            return false;
        };
        self.mac(order_id, code).verify_slice(&expected).is_ok()
    }

    fn mac(&self, order_id: Uuid, code: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(order_id.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        mac
    }
}

/// Check the shape of a submitted code: exactly four ASCII digits
pub fn parse_code(input: &str) -> Result<&str, OtpFormatError> {
    let code = input.trim();
    if code.len() != OTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OtpFormatError);
    }
    Ok(code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("OTP must be exactly 4 digits")]
pub struct OtpFormatError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_code_verifies() {
        let issuer = OtpIssuer::seeded("secret", 7);
        let order = Uuid::new_v4();
        let (code, hash) = issuer.issue(order);

        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(issuer.verify(order, &code, &hash));
    }

    #[test]
    fn hash_is_bound_to_order_and_key() {
        let issuer = OtpIssuer::seeded("secret", 7);
        let other_key = OtpIssuer::seeded("other", 7);
        let order = Uuid::new_v4();
        let (code, hash) = issuer.issue(order);

        assert!(!issuer.verify(Uuid::new_v4(), &code, &hash));
        assert!(!other_key.verify(order, &code, &hash));
    }

    #[test]
    fn wrong_code_or_garbage_hash_fails() {
        let issuer = OtpIssuer::seeded("secret", 1);
        let order = Uuid::new_v4();
        let hash = issuer.hash(order, "1234");

        assert!(!issuer.verify(order, "4321", &hash));
        assert!(!issuer.verify(order, "1234", "not-hex"));
        assert!(issuer.verify(order, "1234", &hash));
    }

    #[test]
    fn codes_keep_leading_zeros() {
        let issuer = OtpIssuer::seeded("secret", 99);
        for _ in 0..200 {
            let (code, _) = issuer.issue(Uuid::nil());
            assert_eq!(code.len(), OTP_DIGITS);
        }
    }

    #[test]
    fn parse_code_rejects_bad_shapes() {
        assert_eq!(parse_code(" 0420 "), Ok("0420"));
        assert_eq!(parse_code("123"), Err(OtpFormatError));
        assert_eq!(parse_code("12345"), Err(OtpFormatError));
        assert_eq!(parse_code("12a4"), Err(OtpFormatError));
        assert_eq!(parse_code("١٢٣٤"), Err(OtpFormatError));
    }
}
