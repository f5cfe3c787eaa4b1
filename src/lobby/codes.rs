use rand::Rng;

/// Room code alphabet: uppercase letters and digits with the ambiguous
/// characters 0, O, 1, I and L removed, so codes survive being read aloud.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of every generated room code.
pub const CODE_LENGTH: usize = 6;

/// Generate a random room code. Uniqueness is the registry's concern; it
/// rejection-samples against the codes currently in use.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}
