//! Variable-length quantities and big-endian fixed-width primitives.

use crate::{Error, Result};

/// Largest value a 4-byte variable-length quantity can hold.
pub const MAX_VAR_LEN: u32 = 0x0FFF_FFFF;

fn byte_at(buf: &[u8], pos: usize) -> Result<u8> {
    buf.get(pos)
        .copied()
        .ok_or(Error::UnexpectedEof { offset: pos })
}

/// Decode a variable-length quantity starting at `pos`.
///
/// Reads at most 4 bytes; each contributes its low 7 bits and the high bit
/// marks continuation. Returns the value and the position after it.
pub fn read_var_len(buf: &[u8], pos: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut i = pos;

    for _ in 0..4 {
        let b = byte_at(buf, i)?;
        i += 1;
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok((value, i));
        }
    }

    // Continuation bit still set on the 4th byte: stop there anyway.
    Ok((value, i))
}

/// Append the minimal variable-length encoding of `value` to `buf`.
///
/// Values above [`MAX_VAR_LEN`] are clamped.
pub fn push_var_len(buf: &mut Vec<u8>, value: u32) {
    let mut value = value.min(MAX_VAR_LEN);

    let mut bytes = [0u8; 4];
    let mut len = 0;
    loop {
        bytes[len] = (value & 0x7F) as u8;
        if len > 0 {
            bytes[len] |= 0x80;
        }
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }

    buf.extend(bytes[..len].iter().rev());
}

/// Minimal variable-length encoding of `value`.
pub fn write_var_len(value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    push_var_len(&mut buf, value);
    buf
}

/// Big-endian u16 at `pos`.
pub fn read_u16(buf: &[u8], pos: usize) -> Result<u16> {
    let hi = byte_at(buf, pos)?;
    let lo = byte_at(buf, pos + 1)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

/// Big-endian u32 at `pos`.
pub fn read_u32(buf: &[u8], pos: usize) -> Result<u32> {
    let bytes = buf
        .get(pos..pos + 4)
        .ok_or(Error::UnexpectedEof { offset: buf.len() })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// The 4-byte chunk tag at `pos`, lossily decoded for diagnostics.
pub fn read_tag(buf: &[u8], pos: usize) -> Result<[u8; 4]> {
    let bytes = buf
        .get(pos..pos + 4)
        .ok_or(Error::UnexpectedEof { offset: buf.len() })?;
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Fail unless the chunk tag at `pos` is `expected`.
pub fn expect_tag(buf: &[u8], pos: usize, expected: &[u8; 4]) -> Result<()> {
    let found = match read_tag(buf, pos) {
        Ok(tag) => tag,
        Err(_) => {
            return Err(Error::BadChunkTag {
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(buf.get(pos..).unwrap_or_default()).into_owned(),
                offset: pos,
            })
        }
    };

    if &found != expected {
        return Err(Error::BadChunkTag {
            expected: String::from_utf8_lossy(expected).into_owned(),
            found: String::from_utf8_lossy(&found).into_owned(),
            offset: pos,
        });
    }
    Ok(())
}
