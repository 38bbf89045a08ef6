//! Opcode bytes and their static stack requirements.
//!
//! Bytes without an entry in [`OPCODE_INFO`] are not supported and halt the
//! frame as invalid. That covers unassigned bytes, `INVALID` itself and the
//! post-Shanghai opcodes (transient storage, blobs, `MCOPY`) as well as
//! `SELFDESTRUCT`.

// 0x00 - 0x0F: Stop and Arithmetic Operations
pub const STOP: u8 = 0x00;
pub const ADD: u8 = 0x01;
pub const MUL: u8 = 0x02;
pub const SUB: u8 = 0x03;
pub const DIV: u8 = 0x04;
pub const SDIV: u8 = 0x05;
pub const MOD: u8 = 0x06;
pub const SMOD: u8 = 0x07;
pub const ADDMOD: u8 = 0x08;
pub const MULMOD: u8 = 0x09;
pub const EXP: u8 = 0x0a;
pub const SIGNEXTEND: u8 = 0x0b;

// 0x10 - 0x1F: Comparison & Bitwise Logic Operations
pub const LT: u8 = 0x10;
pub const GT: u8 = 0x11;
pub const SLT: u8 = 0x12;
pub const SGT: u8 = 0x13;
pub const EQ: u8 = 0x14;
pub const ISZERO: u8 = 0x15;
pub const AND: u8 = 0x16;
pub const OR: u8 = 0x17;
pub const XOR: u8 = 0x18;
pub const NOT: u8 = 0x19;
pub const BYTE: u8 = 0x1a;
pub const SHL: u8 = 0x1b;
pub const SHR: u8 = 0x1c;
pub const SAR: u8 = 0x1d;

pub const KECCAK256: u8 = 0x20;

// 0x30 - 0x3F: Environmental Information
pub const ADDRESS: u8 = 0x30;
pub const BALANCE: u8 = 0x31;
pub const ORIGIN: u8 = 0x32;
pub const CALLER: u8 = 0x33;
pub const CALLVALUE: u8 = 0x34;
pub const CALLDATALOAD: u8 = 0x35;
pub const CALLDATASIZE: u8 = 0x36;
pub const CALLDATACOPY: u8 = 0x37;
pub const CODESIZE: u8 = 0x38;
pub const CODECOPY: u8 = 0x39;
pub const GASPRICE: u8 = 0x3a;
pub const EXTCODESIZE: u8 = 0x3b;
pub const EXTCODECOPY: u8 = 0x3c;
pub const RETURNDATASIZE: u8 = 0x3d;
pub const RETURNDATACOPY: u8 = 0x3e;
pub const EXTCODEHASH: u8 = 0x3f;

// 0x40 - 0x4F: Block Information
pub const BLOCKHASH: u8 = 0x40;
pub const COINBASE: u8 = 0x41;
pub const TIMESTAMP: u8 = 0x42;
pub const NUMBER: u8 = 0x43;
pub const DIFFICULTY: u8 = 0x44;
pub const GASLIMIT: u8 = 0x45;
pub const CHAINID: u8 = 0x46;
pub const SELFBALANCE: u8 = 0x47;
pub const BASEFEE: u8 = 0x48;

// 0x50 - 0x5F: Stack, Memory, Storage and Flow Operations
pub const POP: u8 = 0x50;
pub const MLOAD: u8 = 0x51;
pub const MSTORE: u8 = 0x52;
pub const MSTORE8: u8 = 0x53;
pub const SLOAD: u8 = 0x54;
pub const SSTORE: u8 = 0x55;
pub const JUMP: u8 = 0x56;
pub const JUMPI: u8 = 0x57;
pub const PC: u8 = 0x58;
pub const MSIZE: u8 = 0x59;
pub const GAS: u8 = 0x5a;
pub const JUMPDEST: u8 = 0x5b;
pub const PUSH0: u8 = 0x5f;

pub const PUSH1: u8 = 0x60;
pub const PUSH2: u8 = 0x61;
pub const PUSH4: u8 = 0x63;
pub const PUSH20: u8 = 0x73;
pub const PUSH32: u8 = 0x7f;
pub const DUP1: u8 = 0x80;
pub const DUP16: u8 = 0x8f;
pub const SWAP1: u8 = 0x90;
pub const SWAP16: u8 = 0x9f;
pub const LOG0: u8 = 0xa0;
pub const LOG1: u8 = 0xa1;
pub const LOG2: u8 = 0xa2;
pub const LOG3: u8 = 0xa3;
pub const LOG4: u8 = 0xa4;

// 0xF0 - 0xFF: System Operations
pub const CREATE: u8 = 0xf0;
pub const CALL: u8 = 0xf1;
pub const CALLCODE: u8 = 0xf2;
pub const RETURN: u8 = 0xf3;
pub const DELEGATECALL: u8 = 0xf4;
pub const CREATE2: u8 = 0xf5;
pub const STATICCALL: u8 = 0xfa;
pub const REVERT: u8 = 0xfd;
pub const INVALID: u8 = 0xfe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub name: &'static str,
    pub inputs: u8,
    pub outputs: u8,
}

const fn op(name: &'static str, inputs: u8, outputs: u8) -> Option<OpInfo> {
    Some(OpInfo { name, inputs, outputs })
}

const PUSH_NAMES: [&str; 32] = [
    "PUSH1", "PUSH2", "PUSH3", "PUSH4", "PUSH5", "PUSH6", "PUSH7", "PUSH8", "PUSH9", "PUSH10",
    "PUSH11", "PUSH12", "PUSH13", "PUSH14", "PUSH15", "PUSH16", "PUSH17", "PUSH18", "PUSH19",
    "PUSH20", "PUSH21", "PUSH22", "PUSH23", "PUSH24", "PUSH25", "PUSH26", "PUSH27", "PUSH28",
    "PUSH29", "PUSH30", "PUSH31", "PUSH32",
];

const DUP_NAMES: [&str; 16] = [
    "DUP1", "DUP2", "DUP3", "DUP4", "DUP5", "DUP6", "DUP7", "DUP8", "DUP9", "DUP10", "DUP11",
    "DUP12", "DUP13", "DUP14", "DUP15", "DUP16",
];

const SWAP_NAMES: [&str; 16] = [
    "SWAP1", "SWAP2", "SWAP3", "SWAP4", "SWAP5", "SWAP6", "SWAP7", "SWAP8", "SWAP9", "SWAP10",
    "SWAP11", "SWAP12", "SWAP13", "SWAP14", "SWAP15", "SWAP16",
];

const LOG_NAMES: [&str; 5] = ["LOG0", "LOG1", "LOG2", "LOG3", "LOG4"];

pub static OPCODE_INFO: [Option<OpInfo>; 256] = build_table();

const fn build_table() -> [Option<OpInfo>; 256] {
    let mut t: [Option<OpInfo>; 256] = [None; 256];

    t[STOP as usize] = op("STOP", 0, 0);
    t[ADD as usize] = op("ADD", 2, 1);
    t[MUL as usize] = op("MUL", 2, 1);
    t[SUB as usize] = op("SUB", 2, 1);
    t[DIV as usize] = op("DIV", 2, 1);
    t[SDIV as usize] = op("SDIV", 2, 1);
    t[MOD as usize] = op("MOD", 2, 1);
    t[SMOD as usize] = op("SMOD", 2, 1);
    t[ADDMOD as usize] = op("ADDMOD", 3, 1);
    t[MULMOD as usize] = op("MULMOD", 3, 1);
    t[EXP as usize] = op("EXP", 2, 1);
    t[SIGNEXTEND as usize] = op("SIGNEXTEND", 2, 1);

    t[LT as usize] = op("LT", 2, 1);
    t[GT as usize] = op("GT", 2, 1);
    t[SLT as usize] = op("SLT", 2, 1);
    t[SGT as usize] = op("SGT", 2, 1);
    t[EQ as usize] = op("EQ", 2, 1);
    t[ISZERO as usize] = op("ISZERO", 1, 1);
    t[AND as usize] = op("AND", 2, 1);
    t[OR as usize] = op("OR", 2, 1);
    t[XOR as usize] = op("XOR", 2, 1);
    t[NOT as usize] = op("NOT", 1, 1);
    t[BYTE as usize] = op("BYTE", 2, 1);
    t[SHL as usize] = op("SHL", 2, 1);
    t[SHR as usize] = op("SHR", 2, 1);
    t[SAR as usize] = op("SAR", 2, 1);

    t[KECCAK256 as usize] = op("KECCAK256", 2, 1);

    t[ADDRESS as usize] = op("ADDRESS", 0, 1);
    t[BALANCE as usize] = op("BALANCE", 1, 1);
    t[ORIGIN as usize] = op("ORIGIN", 0, 1);
    t[CALLER as usize] = op("CALLER", 0, 1);
    t[CALLVALUE as usize] = op("CALLVALUE", 0, 1);
    t[CALLDATALOAD as usize] = op("CALLDATALOAD", 1, 1);
    t[CALLDATASIZE as usize] = op("CALLDATASIZE", 0, 1);
    t[CALLDATACOPY as usize] = op("CALLDATACOPY", 3, 0);
    t[CODESIZE as usize] = op("CODESIZE", 0, 1);
    t[CODECOPY as usize] = op("CODECOPY", 3, 0);
    t[GASPRICE as usize] = op("GASPRICE", 0, 1);
    t[EXTCODESIZE as usize] = op("EXTCODESIZE", 1, 1);
    t[EXTCODECOPY as usize] = op("EXTCODECOPY", 4, 0);
    t[RETURNDATASIZE as usize] = op("RETURNDATASIZE", 0, 1);
    t[RETURNDATACOPY as usize] = op("RETURNDATACOPY", 3, 0);
    t[EXTCODEHASH as usize] = op("EXTCODEHASH", 1, 1);

    t[BLOCKHASH as usize] = op("BLOCKHASH", 1, 1);
    t[COINBASE as usize] = op("COINBASE", 0, 1);
    t[TIMESTAMP as usize] = op("TIMESTAMP", 0, 1);
    t[NUMBER as usize] = op("NUMBER", 0, 1);
    t[DIFFICULTY as usize] = op("DIFFICULTY", 0, 1);
    t[GASLIMIT as usize] = op("GASLIMIT", 0, 1);
    t[CHAINID as usize] = op("CHAINID", 0, 1);
    t[SELFBALANCE as usize] = op("SELFBALANCE", 0, 1);
    t[BASEFEE as usize] = op("BASEFEE", 0, 1);

    t[POP as usize] = op("POP", 1, 0);
    t[MLOAD as usize] = op("MLOAD", 1, 1);
    t[MSTORE as usize] = op("MSTORE", 2, 0);
    t[MSTORE8 as usize] = op("MSTORE8", 2, 0);
    t[SLOAD as usize] = op("SLOAD", 1, 1);
    t[SSTORE as usize] = op("SSTORE", 2, 0);
    t[JUMP as usize] = op("JUMP", 1, 0);
    t[JUMPI as usize] = op("JUMPI", 2, 0);
    t[PC as usize] = op("PC", 0, 1);
    t[MSIZE as usize] = op("MSIZE", 0, 1);
    t[GAS as usize] = op("GAS", 0, 1);
    t[JUMPDEST as usize] = op("JUMPDEST", 0, 0);
    t[PUSH0 as usize] = op("PUSH0", 0, 1);

    let mut i = 0;
    while i < 32 {
        t[PUSH1 as usize + i] = op(PUSH_NAMES[i], 0, 1);
        i += 1;
    }
    let mut i = 0;
    while i < 16 {
        t[DUP1 as usize + i] = op(DUP_NAMES[i], i as u8 + 1, i as u8 + 2);
        t[SWAP1 as usize + i] = op(SWAP_NAMES[i], i as u8 + 2, i as u8 + 2);
        i += 1;
    }
    let mut i = 0;
    while i < 5 {
        t[LOG0 as usize + i] = op(LOG_NAMES[i], i as u8 + 2, 0);
        i += 1;
    }

    t[CREATE as usize] = op("CREATE", 3, 1);
    t[CALL as usize] = op("CALL", 7, 1);
    t[CALLCODE as usize] = op("CALLCODE", 7, 1);
    t[RETURN as usize] = op("RETURN", 2, 0);
    t[DELEGATECALL as usize] = op("DELEGATECALL", 6, 1);
    t[CREATE2 as usize] = op("CREATE2", 4, 1);
    t[STATICCALL as usize] = op("STATICCALL", 6, 1);
    t[REVERT as usize] = op("REVERT", 2, 0);

    t
}

pub fn info(opcode: u8) -> Option<OpInfo> {
    OPCODE_INFO[opcode as usize]
}

pub fn is_push(opcode: u8) -> bool {
    (PUSH1..=PUSH32).contains(&opcode)
}

/// Immediate bytes following a PUSH opcode.
pub fn push_bytes(opcode: u8) -> usize {
    if is_push(opcode) {
        (opcode - PUSH1 + 1) as usize
    } else {
        0
    }
}

/// Marks every JUMPDEST that is an instruction rather than PUSH data.
pub fn analyze_jumpdests(code: &[u8]) -> Vec<bool> {
    let mut valid = vec![false; code.len()];
    let mut pc = 0;
    while pc < code.len() {
        let opcode = code[pc];
        if opcode == JUMPDEST {
            valid[pc] = true;
        }
        pc += 1 + push_bytes(opcode);
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_bytes() {
        assert_eq!(push_bytes(PUSH1), 1);
        assert_eq!(push_bytes(PUSH32), 32);
        assert_eq!(push_bytes(PUSH0), 0);
        assert_eq!(push_bytes(ADD), 0);
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(info(ADD).map(|i| i.name), Some("ADD"));
        assert_eq!(info(0x7a).map(|i| i.name), Some("PUSH27"));
        assert_eq!(info(0x85).map(|i| (i.inputs, i.outputs)), Some((6, 7)));
        assert_eq!(info(0x93).map(|i| (i.inputs, i.outputs)), Some((5, 5)));
        assert_eq!(info(LOG4).map(|i| i.inputs), Some(6));
        for (topics, op) in [LOG1, LOG2, LOG3].into_iter().enumerate() {
            assert_eq!(op, LOG0 + topics as u8 + 1);
            assert_eq!(info(op).map(|i| i.inputs), Some(topics as u8 + 3));
        }
    }

    #[test]
    fn test_unsupported_opcodes() {
        for byte in [0x0c, 0x49, 0x4a, 0x5c, 0x5d, 0x5e, INVALID, 0xff] {
            assert!(info(byte).is_none(), "{:#x} should be unsupported", byte);
        }
    }

    #[test]
    fn test_jumpdest_inside_push_data() {
        // PUSH2 0x5b5b, JUMPDEST
        let code = [PUSH2, JUMPDEST, JUMPDEST, JUMPDEST];
        assert_eq!(analyze_jumpdests(&code), vec![false, false, false, true]);

        // Truncated push at the end of code.
        assert_eq!(analyze_jumpdests(&[PUSH32, JUMPDEST]), vec![false, false]);
    }
}
