use sandbox_evm::TxContext;
use sandbox_rlp::{Decoder, Encoder, RlpError};
use sandbox_types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A request to run a Call (`to` set) or a Create (`to` absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Option<Address>,
    pub gas: u64,
    pub gas_price: U256,
    pub value: U256,
    pub data: Bytes,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

pub fn build_tx_context(transaction: &Transaction) -> TxContext {
    TxContext {
        origin: transaction.from,
        gas_price: transaction.gas_price,
    }
}

/// Pre-EIP-2718 transaction as it travels in a raw RLP blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl LegacyTransaction {
    /// Decodes `rlp([nonce, gasPrice, gas, to, value, data, v, r, s])`.
    pub fn decode(raw: &[u8]) -> Result<Self, RlpError> {
        let mut outer = Decoder::new(raw);
        let mut fields = outer.list()?;
        outer.finish()?;

        let nonce = fields.decode_u64()?;
        let gas_price = fields.decode_u256()?;
        let gas_limit = fields.decode_u64()?;
        let to = {
            let bytes = fields.decode_bytes()?;
            if bytes.is_empty() {
                None
            } else {
                Some(Address::from_slice(bytes).map_err(|_| {
                    RlpError::InvalidData(format!("Invalid address length: {}", bytes.len()))
                })?)
            }
        };
        let value = fields.decode_u256()?;
        let data = Bytes::from_slice(fields.decode_bytes()?);
        let v = fields.decode_u64()?;
        let r = fields.decode_u256()?;
        let s = fields.decode_u256()?;
        fields.finish()?;

        Ok(LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            v,
            r,
            s,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|list| {
            list.encode_u64(self.nonce);
            list.encode_u256(self.gas_price);
            list.encode_u64(self.gas_limit);
            match &self.to {
                Some(to) => list.encode_bytes(to.as_bytes()),
                None => list.encode_bytes(&[]),
            }
            list.encode_u256(self.value);
            list.encode_bytes(self.data.as_slice());
            list.encode_u64(self.v);
            list.encode_u256(self.r);
            list.encode_u256(self.s);
        });
        encoder.finish()
    }

    /// The sandbox does not verify signatures; the sender is supplied.
    pub fn into_transaction(self, from: Address) -> Transaction {
        Transaction {
            from,
            to: self.to,
            gas: self.gas_limit,
            gas_price: self.gas_price,
            value: self.value,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(to: Option<Address>) -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to,
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Bytes::from_vec(vec![0xde, 0xad]),
            v: 37,
            r: U256::from(1),
            s: U256::from(2),
        }
    }

    #[test]
    fn test_decode_legacy_transaction() {
        let tx = legacy(Some(Address::from_low_u64_be(0x3535)));
        let decoded = LegacyTransaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);

        let from = Address::from_low_u64_be(0xf00);
        let converted = decoded.into_transaction(from);
        assert_eq!(converted.from, from);
        assert_eq!(converted.gas, 21_000);
        assert!(!converted.is_create());
    }

    #[test]
    fn test_empty_to_is_create() {
        let decoded = LegacyTransaction::decode(&legacy(None).encode()).unwrap();
        assert_eq!(decoded.to, None);
        assert!(decoded.into_transaction(Address::ZERO).is_create());
    }

    #[test]
    fn test_malformed_raw_transaction() {
        assert!(LegacyTransaction::decode(&[]).is_err());
        assert!(LegacyTransaction::decode(&[0x80]).is_err());

        let mut raw = legacy(None).encode();
        raw.push(0x00);
        assert!(matches!(LegacyTransaction::decode(&raw), Err(RlpError::TrailingBytes(1))));
    }

    #[test]
    fn test_tx_context() {
        let tx = legacy(None).into_transaction(Address::from_low_u64_be(7));
        let context = build_tx_context(&tx);
        assert_eq!(context.origin, Address::from_low_u64_be(7));
        assert_eq!(context.gas_price, U256::from(20_000_000_000u64));
    }
}
