//! Payload masking. Masking and unmasking are the same operation.

/// XORs `buf` with `key`, where `offset` is the position of `buf[0]` within the whole
/// payload. Calling it twice with the same arguments restores the input, and a payload
/// may be processed in arbitrary pieces as long as each piece carries its own offset.
#[inline]
pub fn apply_mask(key: [u8; 4], buf: &mut [u8], offset: usize) {
    let key = rotate(key, offset);
    if buf.len() < 16 {
        apply_mask_fallback(key, buf);
        return;
    }

    let mask_u32 = u32::from_ne_bytes(key);
    let mask_u64 = u64::from_ne_bytes([key[0], key[1], key[2], key[3], key[0], key[1], key[2], key[3]]);

    let mut words = buf.chunks_exact_mut(8);
    for word in words.by_ref() {
        // 8 is a multiple of 4 so every word starts at key index 0
        let value = u64::from_ne_bytes([word[0], word[1], word[2], word[3], word[4], word[5], word[6], word[7]]);
        word.copy_from_slice(&(value ^ mask_u64).to_ne_bytes());
    }

    let suffix = words.into_remainder();
    if suffix.len() >= 4 {
        let (word, rest) = suffix.split_at_mut(4);
        let value = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
        word.copy_from_slice(&(value ^ mask_u32).to_ne_bytes());
        apply_mask_fallback(key, rest);
    } else {
        apply_mask_fallback(key, suffix);
    }
}

/// Key as seen from a payload position `offset`.
#[inline(always)]
const fn rotate(key: [u8; 4], offset: usize) -> [u8; 4] {
    let shift = offset & 3;
    [key[shift], key[(shift + 1) & 3], key[(shift + 2) & 3], key[(shift + 3) & 3]]
}

#[inline(always)]
fn apply_mask_fallback(key: [u8; 4], buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}
