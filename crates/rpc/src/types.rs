use crate::RpcError;
use sandbox_executor::Transaction;
use sandbox_types::{decode_hex, Address, Bytes, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

pub const JSONRPC_VERSION: &str = "2.0";

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

fn params_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Accepted but not echoed; response ids come from per-method counters.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        RpcRequest {
            jsonrpc: default_version(),
            id: Value::from(1),
            method: method.into(),
            params,
        }
    }
}

/// Response envelope. `error` is the UTF-8 failure message as hex bytes,
/// `null` on success; `result` carries output bytes either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub error: Option<Bytes>,
    pub result: Bytes,
    #[serde(rename = "gasLeft")]
    pub gas_left: u64,
}

impl RpcResponse {
    pub fn success(id: u64, result: Bytes, gas_left: u64) -> Self {
        RpcResponse {
            jsonrpc: default_version(),
            id,
            error: None,
            result,
            gas_left,
        }
    }

    pub fn failure(id: u64, message: &str, result: Bytes, gas_left: u64) -> Self {
        RpcResponse {
            jsonrpc: default_version(),
            id,
            error: Some(Bytes::from_slice(message.as_bytes())),
            result,
            gas_left,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Unsigned integer given as a JSON number, a `0x` hex string or a decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quantity(pub U256);

impl Quantity {
    pub fn to_u64(self, field: &str) -> crate::Result<u64> {
        if self.0 > U256::from(u64::MAX) {
            return Err(RpcError::InvalidParams(format!("{} does not fit 64 bits", field)));
        }
        Ok(self.0.low_u64())
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some("") => U256::zero(),
            Some(digits) => U256::from_str_radix(digits, 16).map_err(|_| format!("invalid hex quantity {}", s))?,
            None => U256::from_dec_str(s).map_err(|_| format!("invalid quantity {}", s))?,
        };
        Ok(Quantity(value))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(|v| Quantity(U256::from(v)))
                .ok_or_else(|| de::Error::custom(format!("invalid quantity {}", n))),
            Value::String(s) => s.parse().map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("invalid quantity {}", other))),
        }
    }
}

/// Transaction parameter of `eth_call` and `eth_send`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub gas: Option<Quantity>,
    #[serde(default)]
    pub gas_price: Option<Quantity>,
    #[serde(default)]
    pub value: Option<Quantity>,
    #[serde(default, alias = "input")]
    pub data: Option<String>,
}

impl TransactionRequest {
    /// Accepts the object itself or a JSON string holding it.
    pub fn from_param(param: &Value) -> crate::Result<Self> {
        let parsed = match param {
            Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| RpcError::InvalidParams(format!("transaction: {}", e)))
    }

    /// Missing sender falls back to `default_sender`; missing or zero gas to `default_gas`.
    pub fn into_transaction(self, default_sender: Address, default_gas: u64) -> crate::Result<Transaction> {
        let from = parse_address(self.from.as_deref().unwrap_or_default(), "from")?.unwrap_or(default_sender);
        let to = parse_address(self.to.as_deref().unwrap_or_default(), "to")?;
        let gas = match self.gas.unwrap_or_default().to_u64("gas")? {
            0 => default_gas,
            gas => gas,
        };
        let data = decode_hex(self.data.as_deref().unwrap_or_default())
            .map_err(|e| RpcError::InvalidParams(format!("data: {}", e)))?;

        Ok(Transaction {
            from,
            to,
            gas,
            gas_price: self.gas_price.unwrap_or_default().0,
            value: self.value.unwrap_or_default().0,
            data: Bytes::from_vec(data),
        })
    }
}

/// Empty input (or a bare `0x`) means no address.
pub fn parse_address(text: &str, field: &str) -> crate::Result<Option<Address>> {
    let text = text.trim();
    if text.is_empty() || text == "0x" {
        return Ok(None);
    }
    Address::from_str(text)
        .map(Some)
        .map_err(|e| RpcError::InvalidParams(format!("{}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_params_default() {
        let request: RpcRequest = serde_json::from_value(json!({"method": "eth_send"})).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert!(request.params.is_empty());

        let request: RpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 4, "method": "x", "params": null})).unwrap();
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_response_envelope_shape() {
        let response = RpcResponse::failure(3, "out of gas", Bytes::from_vec(vec![0xab]), 0);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "error": "0x6f7574206f6620676173",
                "result": "0xab",
                "gasLeft": 0
            })
        );

        let decoded: RpcResponse = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.error_message().as_deref(), Some("out of gas"));

        let ok = serde_json::to_value(RpcResponse::success(0, Bytes::new(), 7)).unwrap();
        assert_eq!(ok["error"], Value::Null);
        assert_eq!(ok["result"], "0x");
    }

    #[test]
    fn test_quantity_forms() {
        let parse = |v: Value| serde_json::from_value::<Quantity>(v).unwrap().0;
        assert_eq!(parse(json!(21000)), U256::from(21000));
        assert_eq!(parse(json!("0x5208")), U256::from(21000));
        assert_eq!(parse(json!("21000")), U256::from(21000));
        assert_eq!(parse(json!("0x")), U256::zero());
        assert!(serde_json::from_value::<Quantity>(json!(-1)).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("0xzz")).is_err());
        assert!(Quantity(U256::MAX).to_u64("gas").is_err());
    }

    #[test]
    fn test_transaction_request_from_string_param() {
        let sender = Address::from_low_u64_be(0xa);
        let param = json!(r#"{"from":"","to":"0x00000000000000000000000000000000000000bb","gas":0,"value":"0x10","data":"0x01"}"#);

        let tx = TransactionRequest::from_param(&param)
            .unwrap()
            .into_transaction(sender, 1_000_000)
            .unwrap();

        assert_eq!(tx.from, sender);
        assert_eq!(tx.to, Some(Address::from_low_u64_be(0xbb)));
        assert_eq!(tx.gas, 1_000_000);
        assert_eq!(tx.value, U256::from(16));
        assert_eq!(tx.data.as_slice(), &[1]);
    }

    #[test]
    fn test_empty_to_is_create() {
        let tx = TransactionRequest::from_param(&json!({"to": "", "gas": "0x64", "input": "0x6000"}))
            .unwrap()
            .into_transaction(Address::ZERO, 5)
            .unwrap();
        assert!(tx.is_create());
        assert_eq!(tx.gas, 100);
        assert_eq!(tx.data.as_slice(), &[0x60, 0x00]);
    }

    #[test]
    fn test_bad_address_is_invalid_params() {
        let err = TransactionRequest::from_param(&json!({"to": "0x1234"}))
            .unwrap()
            .into_transaction(Address::ZERO, 5)
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        assert!(TransactionRequest::from_param(&json!("{not json")).is_err());
    }
}
