use std::sync::Arc;
use tinyrand::RandRange;
use tinyrand_std::thread_rand;

// Unambiguous alphabet: no 0/O or 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated connection ids.
pub const CONN_ID_LEN: usize = 8;

/// Random short identifier for a connection.
pub fn conn_id() -> Arc<str> {
    let mut rng = thread_rand();
    let mut id = String::with_capacity(CONN_ID_LEN);
    for _ in 0..CONN_ID_LEN {
        id.push(ALPHABET[rng.next_range(0..ALPHABET.len())] as char);
    }
    Arc::from(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_length_and_alphabet() {
        let id = conn_id();
        assert_eq!(id.len(), CONN_ID_LEN);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn ids_are_not_trivially_repeating() {
        let a = conn_id();
        let b = conn_id();
        let c = conn_id();
        assert!(!(a == b && b == c));
    }
}
