use rand::Rng;

/// Insert attempts before registration gives up with `AllocationExhausted`.
/// The code space (26^3 * 10^3) makes honest collisions rare; the bound
/// exists so a pathological store state can never loop forever.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 8;

const LETTERS: usize = 3;
const DIGITS: usize = 3;

/// Draws a personal referral code candidate: 3 uppercase letters followed
/// by 3 digits, e.g. `QXB204`. Uniqueness is the store's job (unique
/// index on `referral_code`), not this function's.
pub fn generate_code(rng: &mut impl Rng) -> String {
    let mut code = String::with_capacity(LETTERS + DIGITS);
    for _ in 0..LETTERS {
        code.push(rng.gen_range(b'A'..=b'Z') as char);
    }
    for _ in 0..DIGITS {
        code.push((b'0' + rng.gen_range(0..10u8)) as char);
    }
    code
}

/// Shape check for the `LLLNNN` format.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == LETTERS + DIGITS
        && code.chars().take(LETTERS).all(|c| c.is_ascii_uppercase())
        && code.chars().skip(LETTERS).all(|c| c.is_ascii_digit())
}
