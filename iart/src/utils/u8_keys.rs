//! Searches over the sorted key-byte arrays of `Node4` and `Node16`.

#[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
fn x86_64_sse_find_key_16(key: u8, keys: &[u8; 16], num_children: usize) -> Option<usize> {
    use std::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    // Equality is sign agnostic, so the signed byte lanes are fine here.
    let bitfield = unsafe {
        let key_vec = _mm_set1_epi8(key as i8);
        let results = _mm_cmpeq_epi8(key_vec, _mm_loadu_si128(keys.as_ptr() as *const __m128i));
        let mask = (1i32 << num_children) - 1;
        _mm_movemask_epi8(results) & mask
    };
    if bitfield != 0 {
        return Some(bitfield.trailing_zeros() as usize);
    }
    None
}

fn binary_find_key(key: u8, keys: &[u8], num_children: usize) -> Option<usize> {
    keys[..num_children].binary_search(&key).ok()
}

/// Position of `key` among the first `num_children` entries of a sorted key array.
#[allow(unreachable_code)]
pub fn u8_keys_find_key_position_sorted<const WIDTH: usize>(
    key: u8,
    keys: &[u8; WIDTH],
    num_children: usize,
) -> Option<usize> {
    // Width 4 and under, just use linear search.
    if WIDTH <= 4 {
        return (0..num_children).find(|&i| keys[i] == key);
    }

    if WIDTH == 16 {
        #[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
        {
            let keys: &[u8; 16] = keys[..].try_into().ok()?;
            return x86_64_sse_find_key_16(key, keys, num_children);
        }
    }

    binary_find_key(key, keys, num_children)
}

/// Where `key` belongs among the first `num_children` entries of a sorted key array, or `None`
/// if it is already present.
pub fn u8_keys_find_insert_position_sorted<const WIDTH: usize>(
    key: u8,
    keys: &[u8; WIDTH],
    num_children: usize,
) -> Option<usize> {
    keys[..num_children].binary_search(&key).err()
}
