//! Two's complement helpers for the signed opcodes.

use sandbox_types::U256;

pub fn is_negative(value: U256) -> bool {
    value.bit(255)
}

pub fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        twos_complement(value)
    } else {
        value
    }
}

/// SDIV. Division by zero yields zero; `MIN / -1` wraps back to `MIN`.
pub fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let result = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        twos_complement(result)
    } else {
        result
    }
}

/// SMOD. The result takes the sign of the dividend.
pub fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let result = abs(a) % abs(b);
    if is_negative(a) && !result.is_zero() {
        twos_complement(result)
    } else {
        result
    }
}

/// SIGNEXTEND from byte `ext` (counted from the least significant end).
pub fn sign_extend(ext: U256, x: U256) -> U256 {
    if ext >= U256::from(31) {
        return x;
    }

    let bit_index = ext.low_u64() as usize * 8 + 7;
    let mask = (U256::one() << (bit_index + 1)) - U256::one();
    if x.bit(bit_index) {
        x | !mask
    } else {
        x & mask
    }
}

/// SAR: shift right, filling with the sign bit.
pub fn arithmetic_shr(value: U256, shift: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }

    let shift = shift.low_u64() as usize;
    if shift == 0 || !negative {
        return value >> shift;
    }
    (value >> shift) | (U256::MAX << (256 - shift))
}

pub fn lt_signed(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// BYTE: the `index`-th most significant byte of `value`.
pub fn byte_at(index: U256, value: U256) -> U256 {
    if index >= U256::from(32) {
        return U256::zero();
    }
    U256::from(value.byte(31 - index.low_u64() as usize))
}
