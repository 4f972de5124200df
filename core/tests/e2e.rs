use ethers::types::{Address, Bytes, H160, H256, U256};
use k256::ecdsa::SigningKey;
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;
use vtransfer_core::codec::AbiTuple;
use vtransfer_core::definition::crosschain::{
    CrosschainTransfer, CrosschainTransferResolver, CrosschainTransferState,
};
use vtransfer_core::definition::insurance::{
    Insurance, InsuranceResolver, InsuranceResolverData, InsuranceState,
};
use vtransfer_core::definition::parameterized::{
    Parameterized, ParameterizedResolver, ParameterizedResolverData, ParameterizedState, Rate,
};
use vtransfer_core::definition::MIN_EXPIRATION_WINDOW;
use vtransfer_core::signature::{self, address_of, SigningDomain};
use vtransfer_core::{
    Balance, BlockContext, Definition, Directory, Result, TransferError, TransferRegistry,
};

const INSURANCE: Address = H160([0x01; 20]);
const PARAMETERIZED: Address = H160([0x02; 20]);
const CROSSCHAIN: Address = H160([0x03; 20]);
const NOW: u64 = 1_700_000_000;

fn assert_err<T, E>(res: Result<T>, expected: E)
where
    T: std::fmt::Debug,
    E: std::fmt::Debug + PartialEq<E>,
    TransferError: Into<E> + PartialEq<E>,
{
    match res {
        Err(e) => assert_eq!(e.into(), expected),
        Ok(v) => panic!("Expected error, got Ok({v:?})"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

fn directory() -> Directory {
    [
        Definition::from(Insurance::new(INSURANCE)),
        Definition::from(Parameterized::new(PARAMETERIZED)),
        Definition::from(CrosschainTransfer::new(CROSSCHAIN)),
    ]
    .into_iter()
    .collect()
}

fn balance(amount: u64) -> Balance {
    Balance::new(
        Address::repeat_byte(0xaa),
        U256::from(amount),
        Address::repeat_byte(0xbb),
        U256::zero(),
    )
}

fn ctx() -> BlockContext {
    BlockContext::new(NOW, 100)
}

fn insurance_state(receiver: &SigningKey, mediator: &SigningKey) -> InsuranceState {
    InsuranceState {
        receiver: address_of(receiver.verifying_key()),
        mediator: address_of(mediator.verifying_key()),
        collateral: U256::from(10_000),
        expiration: U256::from(NOW + MIN_EXPIRATION_WINDOW + 1),
        uuid: H256::repeat_byte(0x5a),
    }
}

fn parameterized_state(receiver: &SigningKey, rate: Rate) -> ParameterizedState {
    ParameterizedState {
        receiver: address_of(receiver.verifying_key()),
        start: U256::from(NOW),
        expiration: U256::from(NOW + MIN_EXPIRATION_WINDOW + 1),
        uuid: H256::repeat_byte(0x6b),
        rate,
    }
}

fn crosschain_state(pre_image: H256) -> CrosschainTransferState {
    let initiator = key(0x01);
    let data = H256::repeat_byte(0xda);
    CrosschainTransferState {
        initiator_signature: signature::sign(SigningDomain::Channel, &initiator, &data).unwrap(),
        initiator: address_of(initiator.verifying_key()),
        responder: Address::repeat_byte(0xbb),
        data,
        nonce: U256::one(),
        fee: U256::zero(),
        call_to: Address::zero(),
        call_data: Bytes::default(),
        lock_hash: H256::from_slice(&Sha256::digest(pre_image.as_bytes())),
    }
}

fn encoded_states(
    receiver: &SigningKey,
    mediator: &SigningKey,
    pre_image: H256,
) -> [(Address, Vec<u8>); 3] {
    let rate = Rate {
        delta_amount: U256::one(),
        delta_time: U256::one(),
    };
    let insurance = insurance_state(receiver, mediator).abi_encode();
    let parameterized = parameterized_state(receiver, rate).abi_encode();
    let crosschain = crosschain_state(pre_image).abi_encode();
    [
        (INSURANCE, insurance.to_vec()),
        (PARAMETERIZED, parameterized.to_vec()),
        (CROSSCHAIN, crosschain.to_vec()),
    ]
}

#[test]
fn insurance_mediator_award() {
    init_tracing();
    let dir = directory();
    let (receiver, mediator) = (key(0x11), key(0x12));
    let state = insurance_state(&receiver, &mediator);
    let b = balance(10_000);

    assert!(dir
        .create_transfer(&INSURANCE, &b, &state.abi_encode(), &ctx())
        .unwrap());

    let resolver = InsuranceResolver::signed(
        InsuranceResolverData {
            amount: U256::from(5_000),
            uuid: state.uuid,
        },
        &mediator,
    )
    .unwrap();
    let result = dir
        .resolve_transfer(
            &INSURANCE,
            &b,
            &state.abi_encode(),
            &resolver.abi_encode(),
            &ctx(),
        )
        .unwrap();
    assert_eq!(result.amount, [U256::from(5_000), U256::from(5_000)]);
    assert_eq!(result.total().unwrap(), b.total().unwrap());
}

#[test]
fn insurance_rejects_channel_domain_signature() {
    let dir = directory();
    let (receiver, mediator) = (key(0x11), key(0x12));
    let state = insurance_state(&receiver, &mediator);
    let data = InsuranceResolverData {
        amount: U256::from(5_000),
        uuid: state.uuid,
    };
    let resolver = InsuranceResolver {
        signature: signature::sign(SigningDomain::Channel, &mediator, &data.message_hash())
            .unwrap(),
        data,
    };
    let err = dir
        .resolve_transfer(
            &INSURANCE,
            &balance(10_000),
            &state.abi_encode(),
            &resolver.abi_encode(),
            &ctx(),
        )
        .unwrap_err();
    assert_eq!(err.reason(), "INVALID_SIGNATURE");
}

#[test]
fn parameterized_rate_limit() {
    init_tracing();
    let dir = directory();
    let receiver = key(0x21);
    let state = parameterized_state(
        &receiver,
        Rate {
            delta_amount: U256::one(),
            delta_time: U256::from(100),
        },
    );
    let b = balance(10_000);
    assert!(dir
        .create_transfer(&PARAMETERIZED, &b, &state.abi_encode(), &ctx())
        .unwrap());

    let take = |amount: u64| {
        ParameterizedResolver::signed(
            ParameterizedResolverData {
                uuid: state.uuid,
                payment_amount_taken: U256::from(amount),
            },
            &receiver,
        )
        .unwrap()
        .abi_encode()
    };

    let after_50s = BlockContext::new(NOW + 50, 105);
    let encoded = state.abi_encode();
    let err = dir
        .resolve_transfer(&PARAMETERIZED, &b, &encoded, &take(1), &after_50s)
        .unwrap_err();
    assert_eq!(err.reason(), "EXCEEDS_RATE");

    let after_300s = BlockContext::new(NOW + 300, 130);
    let result = dir
        .resolve_transfer(&PARAMETERIZED, &b, &encoded, &take(3), &after_300s)
        .unwrap();
    assert_eq!(result.amount, [U256::from(9_997), U256::from(3)]);
}

#[test]
fn crosschain_hashlock() {
    init_tracing();
    let dir = directory();
    let pre_image = H256::repeat_byte(0x77);
    let state = crosschain_state(pre_image);
    let b = balance(10_000);
    assert!(dir
        .create_transfer(&CROSSCHAIN, &b, &state.abi_encode(), &ctx())
        .unwrap());

    let reveal = |pre_image: H256| {
        CrosschainTransferResolver {
            responder_signature: vec![0x01; 65].into(),
            pre_image,
        }
        .abi_encode()
    };

    let encoded = state.abi_encode();
    let result = dir
        .resolve_transfer(&CROSSCHAIN, &b, &encoded, &reveal(pre_image), &ctx())
        .unwrap();
    assert_eq!(result.amount, [U256::zero(), U256::from(10_000)]);

    let wrong = reveal(H256::repeat_byte(0x78));
    assert_err(
        dir.resolve_transfer(&CROSSCHAIN, &b, &encoded, &wrong, &ctx()),
        TransferError::InvalidPreimage,
    );

    assert!(CrosschainTransfer::new(CROSSCHAIN)
        .verify_initiator(&state)
        .is_ok());
}

#[test]
fn create_rejects_nonzero_payee_balance() {
    let dir = directory();
    let (receiver, mediator) = (key(0x31), key(0x32));
    let mut b = balance(10_000);
    b.amount[1] = U256::one();

    let states = encoded_states(&receiver, &mediator, H256::repeat_byte(0x01));
    for (address, encoded) in states {
        assert_err(
            dir.create_transfer(&address, &b, &encoded, &ctx()),
            TransferError::NonzeroRecipientBalance,
        );
    }
}

#[test]
fn canonical_cancel_preserves_balance() {
    let dir = directory();
    let (receiver, mediator) = (key(0x41), key(0x42));
    let b = balance(10_000);

    let states = encoded_states(&receiver, &mediator, H256::repeat_byte(0x02));
    for (address, encoded) in states {
        let info = dir.definition(&address).unwrap().registry_information();
        let result = dir
            .resolve_transfer(&address, &b, &encoded, &info.encoded_cancel, &ctx())
            .unwrap();
        assert_eq!(result, b, "{} cancel", info.name);
    }
}

#[test]
fn registry_information_is_stable() {
    let infos = directory().registry_information();
    assert_eq!(infos.len(), 3);
    for info in infos {
        assert!(info.state_encoding.starts_with("tuple("));
        assert!(info.resolver_encoding.starts_with("tuple("));
        assert!(!info.encoded_cancel.is_empty());
    }
}
