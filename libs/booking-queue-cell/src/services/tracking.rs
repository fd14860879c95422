use rand::rngs::OsRng;
use rand::Rng;

/// Uppercase letters and digits without the look-alikes `0 O 1 I`.
pub const TRACKING_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Draw a fresh public tracking code from the OS RNG.
///
/// The code carries no information about the token or the appointment id.
pub fn generate_tracking_code(length: usize) -> String {
    (0..length)
        .map(|_| TRACKING_CODE_ALPHABET[OsRng.gen_range(0..TRACKING_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are read back from SMS and paper slips; accept them in any case.
pub fn normalize_tracking_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
