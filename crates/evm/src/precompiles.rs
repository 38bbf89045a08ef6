use crate::error::{EvmError, EvmResult};
use num_bigint::BigUint;
use ripemd::Ripemd160;
use sandbox_crypto::{recover_address, Signature};
use sandbox_types::{Address, UintExt, H256, U256};
use sha2::{Digest, Sha256};

/// Precompiled contract addresses
pub const ECRECOVER_ADDRESS: u64 = 0x01;
pub const SHA256_ADDRESS: u64 = 0x02;
pub const RIPEMD160_ADDRESS: u64 = 0x03;
pub const IDENTITY_ADDRESS: u64 = 0x04;
pub const MODEXP_ADDRESS: u64 = 0x05;

pub trait PrecompiledContract: Send + Sync {
    fn required_gas(&self, input: &[u8]) -> u64;

    /// Returns the output and the gas spent.
    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)>;
}

fn charge(contract: &dyn PrecompiledContract, input: &[u8], gas_limit: u64) -> EvmResult<u64> {
    let cost = contract.required_gas(input);
    if cost > gas_limit {
        return Err(EvmError::OutOfGas);
    }
    Ok(cost)
}

fn words(len: usize) -> u64 {
    (len as u64 + 31) / 32
}

/// `len` bytes of `input` starting at `offset`, zero-filled past its end.
fn right_padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < input.len() {
        let available = (input.len() - offset).min(len);
        out[..available].copy_from_slice(&input[offset..offset + available]);
    }
    out
}

/// ECRECOVER: address of the key that signed `hash`, or empty output when
/// the signature does not recover.
pub struct EcRecover;

impl PrecompiledContract for EcRecover {
    fn required_gas(&self, _input: &[u8]) -> u64 {
        3000
    }

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = charge(self, input, gas_limit)?;

        // [0-31] hash, [32-63] v, [64-95] r, [96-127] s
        let input = right_padded(input, 0, 128);
        let v = U256::from_big_endian(&input[32..64]);
        if v != U256::from(27) && v != U256::from(28) {
            return Ok((Vec::new(), gas_cost));
        }

        let hash = H256::from_slice(&input[0..32]);
        let signature = Signature::new(
            H256::from_slice(&input[64..96]),
            H256::from_slice(&input[96..128]),
            v.low_u64() as u8 - 27,
        );

        match recover_address(&hash, &signature) {
            Ok(address) => {
                let mut output = vec![0u8; 12];
                output.extend_from_slice(address.as_bytes());
                Ok((output, gas_cost))
            }
            Err(_) => Ok((Vec::new(), gas_cost)),
        }
    }
}

pub struct Sha256Hash;

impl PrecompiledContract for Sha256Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        60 + 12 * words(input.len())
    }

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = charge(self, input, gas_limit)?;
        Ok((Sha256::digest(input).to_vec(), gas_cost))
    }
}

pub struct Ripemd160Hash;

impl PrecompiledContract for Ripemd160Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        600 + 120 * words(input.len())
    }

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = charge(self, input, gas_limit)?;

        // Left-padded to a full word.
        let mut output = vec![0u8; 12];
        output.extend_from_slice(&Ripemd160::digest(input));
        Ok((output, gas_cost))
    }
}

pub struct Identity;

impl PrecompiledContract for Identity {
    fn required_gas(&self, input: &[u8]) -> u64 {
        15 + 3 * words(input.len())
    }

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = charge(self, input, gas_limit)?;
        Ok((input.to_vec(), gas_cost))
    }
}

/// Modular exponentiation, priced per EIP-2565.
pub struct ModExp;

impl ModExp {
    const MIN_GAS: u64 = 200;

    /// Declared base, exponent and modulus lengths; `None` if any does not fit 32 bits.
    fn lengths(input: &[u8]) -> Option<(usize, usize, usize)> {
        let header = right_padded(input, 0, 96);
        let len = |i: usize| {
            let value = U256::from_big_endian(&header[i * 32..(i + 1) * 32]);
            if value > U256::from(u32::MAX) {
                None
            } else {
                value.try_as_usize()
            }
        };
        Some((len(0)?, len(1)?, len(2)?))
    }

    fn iteration_count(exp_len: usize, exp_head: &[u8]) -> u64 {
        let head = U256::from_big_endian(exp_head);
        let head_bits = (head.bits() as u64).saturating_sub(1);
        let count = if exp_len <= 32 {
            head_bits
        } else {
            8u64.saturating_mul(exp_len as u64 - 32).saturating_add(head_bits)
        };
        count.max(1)
    }
}

impl PrecompiledContract for ModExp {
    fn required_gas(&self, input: &[u8]) -> u64 {
        let (base_len, exp_len, mod_len) = match Self::lengths(input) {
            Some(lengths) => lengths,
            None => return u64::MAX,
        };

        let exp_head = right_padded(input, 96 + base_len, exp_len.min(32));
        let iterations = Self::iteration_count(exp_len, &exp_head);

        let words = (base_len.max(mod_len) as u64 + 7) / 8;
        let complexity = words.saturating_mul(words);

        (complexity.saturating_mul(iterations) / 3).max(Self::MIN_GAS)
    }

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = charge(self, input, gas_limit)?;
        let (base_len, exp_len, mod_len) =
            Self::lengths(input).ok_or(EvmError::OutOfGas)?;

        if mod_len == 0 {
            return Ok((Vec::new(), gas_cost));
        }

        let base = BigUint::from_bytes_be(&right_padded(input, 96, base_len));
        let exp = BigUint::from_bytes_be(&right_padded(input, 96 + base_len, exp_len));
        let modulus =
            BigUint::from_bytes_be(&right_padded(input, 96 + base_len + exp_len, mod_len));

        let result = if modulus == BigUint::from(0u32) {
            BigUint::from(0u32)
        } else {
            base.modpow(&exp, &modulus)
        };

        let bytes = result.to_bytes_be();
        let mut output = vec![0u8; mod_len];
        if bytes != [0] {
            let start = mod_len.saturating_sub(bytes.len());
            output[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(mod_len)..]);
        }
        Ok((output, gas_cost))
    }
}

static ECRECOVER: EcRecover = EcRecover;
static SHA256: Sha256Hash = Sha256Hash;
static RIPEMD160: Ripemd160Hash = Ripemd160Hash;
static IDENTITY: Identity = Identity;
static MODEXP: ModExp = ModExp;

/// The precompile installed at `address`, if any.
pub fn precompile(address: &Address) -> Option<&'static dyn PrecompiledContract> {
    let bytes = address.as_bytes();
    if bytes[..19].iter().any(|b| *b != 0) {
        return None;
    }
    match bytes[19] as u64 {
        ECRECOVER_ADDRESS => Some(&ECRECOVER),
        SHA256_ADDRESS => Some(&SHA256),
        RIPEMD160_ADDRESS => Some(&RIPEMD160),
        IDENTITY_ADDRESS => Some(&IDENTITY),
        MODEXP_ADDRESS => Some(&MODEXP),
        _ => None,
    }
}

pub fn is_precompile(address: &Address) -> bool {
    precompile(address).is_some()
}
