//! Verification code generation.

use rand::Rng as _;

/// Produce a six digit login code.
///
/// Each digit is drawn independently, so leading zeros are as likely as any
/// other digit and the code must be treated as a string end to end.
pub fn verification_code() -> String {
  let mut rng = rand::thread_rng();
  (0..6).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}
