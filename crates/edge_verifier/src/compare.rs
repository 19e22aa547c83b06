/// Byte equality whose running time does not depend on where the inputs differ.
///
/// Length is not secret, so unequal lengths return early. Equal lengths always walk
/// every byte pair.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut acc: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }

    core::hint::black_box(acc) == 0
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn equal_inputs() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"abc", b"abc"));
    }

    #[test]
    fn different_lengths() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
    }

    #[test]
    fn single_byte_difference_anywhere() {
        let base = [7u8; 64];
        for i in 0..base.len() {
            let mut other = base;
            other[i] ^= 0x01;
            assert!(!constant_time_eq(&base, &other), "difference at {i} missed");
        }
    }
}
