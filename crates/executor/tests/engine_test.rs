use proptest::prelude::*;
use sandbox_crypto::{create2_address, create_address, keccak256};
use sandbox_evm::opcodes::*;
use sandbox_evm::{build_block_context, ChainConfig, EmptyChain, HaltReason, Header};
use sandbox_executor::{Engine, EngineError, FailureKind, Outcome, Transaction};
use sandbox_storage::{Database, KeyValue, MemoryDatabase, StorageError, WriteBatch};
use sandbox_types::{Address, Bytes, H256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

fn block() -> sandbox_evm::BlockContext {
    let header = Header {
        parent_hash: H256::zero(),
        number: 100,
        timestamp: 1_700_000_000,
        coinbase: Address::from_low_u64_be(0xc0),
        gas_limit: 30_000_000,
        difficulty: U256::one(),
        mix_hash: H256::zero(),
        base_fee: None,
    };
    build_block_context(&header, Arc::new(EmptyChain), None, &ChainConfig::default())
}

fn alice() -> Address {
    Address::from_low_u64_be(0xa11ce)
}

fn bob() -> Address {
    Address::from_low_u64_be(0xb0b)
}

fn setup() -> (Arc<MemoryDatabase>, Engine<MemoryDatabase>) {
    let db = Arc::new(MemoryDatabase::new());
    let engine = Engine::new(Arc::clone(&db), block());
    engine.seed_account(alice(), U256::from(ONE_ETHER), 0).unwrap();
    (db, engine)
}

/// slot0 += 1
fn counter_code() -> Vec<u8> {
    vec![PUSH1, 1, PUSH1, 0, SLOAD, ADD, PUSH1, 0, SSTORE, STOP]
}

/// Writes slot0 = 42 and then reverts with empty data.
fn reverter_code() -> Vec<u8> {
    vec![PUSH1, 42, PUSH1, 0, SSTORE, PUSH1, 0, PUSH1, 0, REVERT]
}

/// Init code that copies `runtime` into memory and returns it.
fn deployer(runtime: &[u8]) -> Vec<u8> {
    let mut code = vec![PUSH1, runtime.len() as u8, DUP1, PUSH1, 11, PUSH1, 0, CODECOPY, PUSH1, 0, RETURN];
    code.extend_from_slice(runtime);
    code
}

fn install(engine: &Engine<MemoryDatabase>, address: Address, code: Vec<u8>) {
    engine.seed_code(address, Bytes::from_vec(code)).unwrap();
}

#[test]
fn test_counter_increments_and_charges_gas() {
    let (_, engine) = setup();
    let counter = Address::from_low_u64_be(0xc0de);
    install(&engine, counter, counter_code());

    let first = engine.call(alice(), counter, Bytes::new(), 100_000, U256::zero()).unwrap();
    assert!(first.is_success());
    assert_eq!(first.gas_used(), 3 + 3 + 2100 + 3 + 3 + 20_000);

    let second = engine.call(alice(), counter, Bytes::new(), 100_000, U256::zero()).unwrap();
    assert_eq!(second.gas_used(), 3 + 3 + 2100 + 3 + 3 + 2900);
    assert_eq!(engine.storage(&counter, &H256::zero()).unwrap(), U256::from(2));
}

#[test]
fn test_value_transfer_creates_target() {
    let (_, engine) = setup();
    let result = engine.call(alice(), bob(), Bytes::new(), 21_000, U256::from(1000)).unwrap();

    assert!(result.is_success());
    assert_eq!(result.gas_remaining, 21_000);
    assert_eq!(engine.balance(&bob()).unwrap(), U256::from(1000));
    assert_eq!(engine.balance(&alice()).unwrap(), U256::from(ONE_ETHER - 1000));
}

#[test]
fn test_insufficient_balance_touches_nothing() {
    let (db, engine) = setup();
    let before = db.dump();

    let result = engine
        .call(alice(), bob(), Bytes::new(), 50_000, U256::from(ONE_ETHER) + U256::one())
        .unwrap();

    assert_eq!(result.failure(), Some(FailureKind::InsufficientBalance));
    assert_eq!(result.gas_remaining, 50_000);
    assert_eq!(db.dump(), before);
    assert!(engine.account(&bob()).unwrap().is_none());
}

#[test]
fn test_revert_rolls_back_and_returns_gas() {
    let (db, engine) = setup();
    let reverter = Address::from_low_u64_be(0xdead);
    install(&engine, reverter, reverter_code());
    let before = db.dump();

    let result = engine.call(alice(), reverter, Bytes::new(), 100_000, U256::from(5)).unwrap();

    assert_eq!(result.failure(), Some(FailureKind::Reverted));
    assert!(result.gas_remaining > 0);
    assert_eq!(db.dump(), before);
    assert_eq!(engine.balance(&reverter).unwrap(), U256::zero());
}

#[test]
fn test_halt_consumes_all_gas() {
    let (db, engine) = setup();
    let broken = Address::from_low_u64_be(0xbad);
    install(&engine, broken, vec![PUSH1, 1, PUSH1, 0, SSTORE, INVALID]);
    let before = db.dump();

    let result = engine.call(alice(), broken, Bytes::new(), 80_000, U256::zero()).unwrap();

    assert_eq!(
        result.failure(),
        Some(FailureKind::InterpreterFault(HaltReason::InvalidOpcode(INVALID)))
    );
    assert_eq!(result.gas_used(), 80_000);
    assert_eq!(db.dump(), before);
}

#[test]
fn test_nested_revert_keeps_outer_writes() {
    let (_, engine) = setup();
    let inner = Address::from_low_u64_be(0x1111);
    let outer = Address::from_low_u64_be(0x2222);
    install(&engine, inner, reverter_code());

    // slot0 = 1; slot1 = CALL(inner)
    let mut code = vec![PUSH1, 1, PUSH1, 0, SSTORE];
    code.extend_from_slice(&[PUSH1, 0, PUSH1, 0, PUSH1, 0, PUSH1, 0, PUSH1, 0, PUSH20]);
    code.extend_from_slice(inner.as_bytes());
    code.extend_from_slice(&[PUSH2, 0xff, 0xff, CALL, PUSH1, 1, SSTORE, STOP]);
    install(&engine, outer, code);

    let result = engine.call(alice(), outer, Bytes::new(), 200_000, U256::zero()).unwrap();

    assert!(result.is_success());
    assert_eq!(engine.storage(&outer, &H256::zero()).unwrap(), U256::one());
    assert_eq!(engine.storage(&outer, &H256::from_low_u64_be(1)).unwrap(), U256::zero());
    assert_eq!(engine.storage(&inner, &H256::zero()).unwrap(), U256::zero());
}

#[test]
fn test_simulate_call_leaves_no_trace() {
    let (db, engine) = setup();
    let counter = Address::from_low_u64_be(0xc0de);
    install(&engine, counter, counter_code());
    let before = db.dump();

    let result = engine
        .simulate_call(alice(), counter, Bytes::new(), 100_000, U256::from(7))
        .unwrap();

    assert!(result.is_success());
    assert_eq!(db.dump(), before);
    assert_eq!(engine.storage(&counter, &H256::zero()).unwrap(), U256::zero());
}

#[test]
fn test_create_deploys_at_derived_address() {
    let (_, engine) = setup();
    let runtime = counter_code();

    let created = engine
        .create(alice(), Bytes::from_vec(deployer(&runtime)), 1_000_000, U256::from(9))
        .unwrap();

    assert!(created.result.is_success());
    let address = created.address.unwrap();
    assert_eq!(address, create_address(&alice(), 0));
    assert_eq!(created.deployed_code.as_slice(), runtime.as_slice());
    assert_eq!(engine.code(&address).unwrap().as_slice(), runtime.as_slice());
    assert_eq!(engine.nonce(&address).unwrap(), 1);
    assert_eq!(engine.nonce(&alice()).unwrap(), 1);
    assert_eq!(engine.balance(&address).unwrap(), U256::from(9));

    let call = engine.call(alice(), address, Bytes::new(), 100_000, U256::zero()).unwrap();
    assert!(call.is_success());
    assert_eq!(engine.storage(&address, &H256::zero()).unwrap(), U256::one());
}

#[test]
fn test_failed_create_still_consumes_nonce() {
    let (_, engine) = setup();

    let created = engine
        .create(alice(), Bytes::from_vec(reverter_code()), 100_000, U256::zero())
        .unwrap();

    assert_eq!(created.result.failure(), Some(FailureKind::Reverted));
    assert!(created.deployed_code.is_empty());
    let address = created.address.unwrap();
    assert!(engine.account(&address).unwrap().is_none());
    assert_eq!(engine.nonce(&alice()).unwrap(), 1);

    let next = engine.create(alice(), Bytes::from_vec(deployer(&[STOP])), 100_000, U256::zero()).unwrap();
    assert_eq!(next.address, Some(create_address(&alice(), 1)));
}

#[test]
fn test_create_collision() {
    let (_, engine) = setup();
    let target = create_address(&alice(), 0);
    engine.seed_account(target, U256::zero(), 1).unwrap();

    let created = engine
        .create(alice(), Bytes::from_vec(deployer(&[STOP])), 100_000, U256::zero())
        .unwrap();

    assert_eq!(created.result.failure(), Some(FailureKind::AddressCollision));
    assert_eq!(created.result.gas_used(), 100_000);
    assert_eq!(engine.nonce(&alice()).unwrap(), 1);
    assert!(engine.code(&target).unwrap().is_empty());
}

#[test]
fn test_deposit_rejects_ef_prefix() {
    let (_, engine) = setup();

    let created = engine
        .create(alice(), Bytes::from_vec(deployer(&[0xef, 0x00])), 200_000, U256::zero())
        .unwrap();

    assert_eq!(
        created.result.failure(),
        Some(FailureKind::InterpreterFault(HaltReason::InvalidCode))
    );
    assert!(engine.account(&created.address.unwrap()).unwrap().is_none());
}

#[test]
fn test_deposit_out_of_gas() {
    let (_, engine) = setup();
    let runtime = vec![STOP; 100];

    // Enough to run the init code, not enough for 100 bytes of deposit.
    let created = engine
        .create(alice(), Bytes::from_vec(deployer(&runtime)), 10_000, U256::zero())
        .unwrap();

    assert_eq!(created.result.failure(), Some(FailureKind::OutOfGas));
    assert_eq!(created.result.gas_used(), 10_000);
    assert!(engine.code(&created.address.unwrap()).unwrap().is_empty());
}

#[test]
fn test_seed_code_refuses_existing_code() {
    let (_, engine) = setup();
    let address = Address::from_low_u64_be(0xc0de);
    install(&engine, address, vec![STOP]);

    let err = engine.seed_code(address, Bytes::from_vec(vec![STOP, STOP])).unwrap_err();
    assert!(matches!(err, EngineError::CodeCollision(a) if a == address));
    assert!(!engine.is_poisoned());
}

#[test]
fn test_transact_dispatches_on_target() {
    let (_, engine) = setup();
    let create = Transaction {
        from: alice(),
        to: None,
        gas: 500_000,
        gas_price: U256::from(1),
        value: U256::zero(),
        data: Bytes::from_vec(deployer(&counter_code())),
    };
    let address = match engine.transact(&create).unwrap() {
        Outcome::Create(created) => created.address.unwrap(),
        other => panic!("unexpected outcome {:?}", other),
    };

    let call = Transaction {
        to: Some(address),
        data: Bytes::new(),
        ..create
    };
    let outcome = engine.transact(&call).unwrap();
    assert!(matches!(outcome, Outcome::Call(_)));
    assert!(outcome.execution().is_success());
    assert_eq!(engine.storage(&address, &H256::zero()).unwrap(), U256::one());
}

/// CREATE twice, then CREATE2 with salt 0x2a, storing each new address
/// in slots 0, 1 and 2. `init` is appended after the runtime.
fn factory_code(init: &[u8]) -> Vec<u8> {
    let len = init.len() as u8;
    let mut code = vec![
        PUSH1, len, PUSH1, 40, PUSH1, 0, CODECOPY,
        PUSH1, len, PUSH1, 0, PUSH1, 0, CREATE, PUSH1, 0, SSTORE,
        PUSH1, len, PUSH1, 0, PUSH1, 0, CREATE, PUSH1, 1, SSTORE,
        PUSH1, 0x2a, PUSH1, len, PUSH1, 0, PUSH1, 0, CREATE2, PUSH1, 2, SSTORE,
        STOP,
    ];
    assert_eq!(code.len(), 40);
    code.extend_from_slice(init);
    code
}

#[test]
fn test_nested_creates_advance_factory_nonce() {
    let (_, engine) = setup();
    let factory = Address::from_low_u64_be(0xfac);
    let init = deployer(&[STOP]);
    install(&engine, factory, factory_code(&init));
    let start = engine.nonce(&factory).unwrap();

    let result = engine.call(alice(), factory, Bytes::new(), 1_000_000, U256::zero()).unwrap();
    assert!(result.is_success(), "{:?}", result.status);

    let slot = |n: u64| engine.storage(&factory, &H256::from_low_u64_be(n)).unwrap();
    let first = create_address(&factory, start);
    let second = create_address(&factory, start + 1);
    let salted = create2_address(&factory, &H256::from_low_u64_be(0x2a), &keccak256(&init));
    assert_ne!(first, second);
    assert_eq!(slot(0), first.to_word());
    assert_eq!(slot(1), second.to_word());
    assert_eq!(slot(2), salted.to_word());
    assert_eq!(engine.nonce(&factory).unwrap(), start + 3);

    for child in [first, second, salted] {
        assert_eq!(engine.code(&child).unwrap().as_slice(), &[STOP]);
        assert_eq!(engine.nonce(&child).unwrap(), 1);
    }
}

#[test]
fn test_simulate_uses_transaction_context() {
    let (db, engine) = setup();
    let target = Address::from_low_u64_be(0x6a5);
    // returns GASPRICE and ORIGIN as two words
    install(
        &engine,
        target,
        vec![GASPRICE, PUSH1, 0, MSTORE, ORIGIN, PUSH1, 32, MSTORE, PUSH1, 64, PUSH1, 0, RETURN],
    );
    let before = db.dump();

    let tx = Transaction {
        from: alice(),
        to: Some(target),
        gas: 100_000,
        gas_price: U256::from(7),
        value: U256::from(3),
        data: Bytes::new(),
    };
    let result = engine.simulate(&tx).unwrap();
    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.output[..32]), U256::from(7));
    assert_eq!(U256::from_big_endian(&result.output[32..]), alice().to_word());
    assert_eq!(db.dump(), before);

    let create = Transaction { to: None, ..tx };
    assert!(matches!(engine.simulate(&create), Err(EngineError::SimulateCreate)));
}

#[test]
fn test_top_level_gas_capped_by_block() {
    let (_, engine) = setup();

    let call = engine.call(alice(), bob(), Bytes::new(), u64::MAX, U256::one()).unwrap();
    assert!(call.is_success());
    assert_eq!(call.gas_limit, 30_000_000);
    assert_eq!(call.gas_remaining, 30_000_000);

    // 16 MiB of memory costs more than the block allows
    let expander = Address::from_low_u64_be(0x3e3);
    install(&engine, expander, vec![PUSH1, 1, PUSH4, 0x01, 0x00, 0x00, 0x00, MSTORE, STOP]);
    let expanded = engine.call(alice(), expander, Bytes::new(), u64::MAX, U256::zero()).unwrap();
    assert_eq!(expanded.failure(), Some(FailureKind::OutOfGas));
    assert_eq!(expanded.gas_used(), 30_000_000);

    let created = engine
        .create(alice(), Bytes::from_vec(deployer(&[STOP])), u64::MAX, U256::zero())
        .unwrap();
    assert!(created.result.is_success());
    assert_eq!(created.result.gas_limit, 30_000_000);
}

/// Memory backend whose writes can be switched off.
#[derive(Default)]
struct FlakyDatabase {
    inner: MemoryDatabase,
    broken: AtomicBool,
}

impl FlakyDatabase {
    fn check(&self) -> sandbox_storage::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StorageError::DatabaseError("disk unplugged".to_string()));
        }
        Ok(())
    }
}

impl Database for FlakyDatabase {
    fn get(&self, key: &[u8]) -> sandbox_storage::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> sandbox_storage::Result<()> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> sandbox_storage::Result<()> {
        self.check()?;
        self.inner.delete(key)
    }

    fn write_batch(&self, batch: WriteBatch) -> sandbox_storage::Result<()> {
        self.check()?;
        self.inner.write_batch(batch)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = sandbox_storage::Result<KeyValue>> + '_> {
        self.inner.iter_prefix(prefix)
    }
}

#[test]
fn test_store_failure_poisons_engine() {
    let db = Arc::new(FlakyDatabase::default());
    let engine = Engine::new(Arc::clone(&db), block());
    let counter = Address::from_low_u64_be(0xc0de);
    engine.seed_account(alice(), U256::from(ONE_ETHER), 0).unwrap();
    engine.seed_code(counter, Bytes::from_vec(counter_code())).unwrap();

    db.broken.store(true, Ordering::SeqCst);
    let err = engine.call(alice(), counter, Bytes::new(), 100_000, U256::zero()).unwrap_err();
    assert!(matches!(err, EngineError::Corrupted(_)));
    assert!(engine.is_poisoned());

    db.broken.store(false, Ordering::SeqCst);
    assert!(matches!(engine.balance(&alice()), Err(EngineError::Poisoned)));
    assert!(matches!(
        engine.call(alice(), counter, Bytes::new(), 100_000, U256::zero()),
        Err(EngineError::Poisoned)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_gas_is_conserved(code in proptest::collection::vec(any::<u8>(), 0..48), gas in 0u64..2_000_000) {
        let (_, engine) = setup();
        let target = Address::from_low_u64_be(0x7a7a);
        install(&engine, target, code);

        let result = engine.call(alice(), target, Bytes::new(), gas, U256::zero()).unwrap();
        prop_assert!(result.gas_remaining <= gas);
        prop_assert_eq!(result.gas_used() + result.gas_remaining, gas);
    }

    #[test]
    fn prop_failed_call_leaves_store_untouched(
        code in proptest::collection::vec(any::<u8>(), 0..48),
        value in 0u64..1000,
    ) {
        let (db, engine) = setup();
        let target = Address::from_low_u64_be(0x7a7a);
        install(&engine, target, code);
        let before = db.dump();

        let result = engine.call(alice(), target, Bytes::new(), 300_000, U256::from(value)).unwrap();
        if !result.is_success() {
            prop_assert_eq!(db.dump(), before);
        }
    }
}
