//! Batches of calls executed by the governor.
//!
//! The governor executes an arbitrary batch of calls through a single
//! transaction to itself. The batch is ABI-encoded as three parallel arrays,
//! `(bytes[] data, address[] to, uint256[] value)`, in that order.

use {
    crate::{node::Receipt, receipt},
    alloy::{
        primitives::{Address, Bytes, U256},
        sol_types::{SolCall, SolValue},
    },
    contracts::bindings::IZeroEx,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GovernorCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl GovernorCall {
    /// A call without value.
    pub fn new(to: Address, call: &impl SolCall) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: call.abi_encode().into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
    #[error("call arrays differ in length: {data} data, {to} targets, {value} values")]
    LengthMismatch { data: usize, to: usize, value: usize },
}

type Encoded = (Vec<Bytes>, Vec<Address>, Vec<U256>);

/// Encodes calls in execution order.
pub fn encode_calls(calls: &[GovernorCall]) -> Bytes {
    let encoded: Encoded = (
        calls.iter().map(|call| call.data.clone()).collect(),
        calls.iter().map(|call| call.to).collect(),
        calls.iter().map(|call| call.value).collect(),
    );
    encoded.abi_encode_params().into()
}

pub fn decode_calls(data: &[u8]) -> Result<Vec<GovernorCall>, CodecError> {
    let (data, to, value) = Encoded::abi_decode_params(data)?;
    if data.len() != to.len() || data.len() != value.len() {
        return Err(CodecError::LengthMismatch {
            data: data.len(),
            to: to.len(),
            value: value.len(),
        });
    }
    Ok(data
        .into_iter()
        .zip(to)
        .zip(value)
        .map(|((data, to), value)| GovernorCall { to, value, data })
        .collect())
}

/// Calls restoring every proxy function the transaction upgraded to the
/// implementation it had before, in the order the upgrades happened.
pub fn rollback_calls(proxy: Address, receipt: &Receipt) -> Vec<GovernorCall> {
    receipt::events::<IZeroEx::ProxyFunctionUpdated>(receipt)
        .into_iter()
        .map(|update| {
            GovernorCall::new(
                proxy,
                &IZeroEx::rollbackCall {
                    selector: update.selector,
                    targetImpl: update.oldImpl,
                },
            )
        })
        .collect()
}

/// Governor calldata reverting the upgrades applied by a transaction.
pub fn encode_rollback_calls(proxy: Address, receipt: &Receipt) -> Bytes {
    encode_calls(&rollback_calls(proxy, receipt))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::receipt::tests::log,
        alloy::primitives::FixedBytes,
        contracts::bindings::IZeroExGovernor,
        hex_literal::hex,
    };

    #[test]
    fn rollback_round_trip() {
        let proxy = Address::repeat_byte(0xde);
        let updates = [
            IZeroEx::ProxyFunctionUpdated {
                selector: FixedBytes(hex!("aa000001")),
                oldImpl: Address::repeat_byte(1),
                newImpl: Address::repeat_byte(2),
            },
            IZeroEx::ProxyFunctionUpdated {
                selector: FixedBytes(hex!("bb000002")),
                oldImpl: Address::ZERO,
                newImpl: Address::repeat_byte(3),
            },
        ];
        let receipt = Receipt {
            logs: vec![
                log(proxy, &updates[0]),
                log(
                    Address::repeat_byte(0x99),
                    &IZeroExGovernor::Execution {
                        transactionId: U256::from(1),
                    },
                ),
                log(proxy, &updates[1]),
            ],
            ..Default::default()
        };

        let calls = decode_calls(&encode_rollback_calls(proxy, &receipt)).unwrap();
        assert_eq!(calls.len(), 2);
        for (call, update) in calls.iter().zip(&updates) {
            assert_eq!(call.to, proxy);
            assert_eq!(call.value, U256::ZERO);
            let rollback = IZeroEx::rollbackCall::abi_decode(&call.data).unwrap();
            assert_eq!(rollback.selector, update.selector);
            assert_eq!(rollback.targetImpl, update.oldImpl);
        }
    }

    #[test]
    fn receipt_without_upgrades_encodes_empty_batch() {
        let calls = decode_calls(&encode_rollback_calls(Address::ZERO, &Receipt::default()));
        assert_eq!(calls.unwrap(), vec![]);
    }

    #[test]
    fn encodes_arrays_in_wire_order() {
        let call = GovernorCall {
            to: Address::repeat_byte(0x11),
            value: U256::from(5),
            data: Bytes::from(vec![0xca, 0xfe]),
        };
        let encoded = encode_calls(std::slice::from_ref(&call));

        // Three head words pointing at the three arrays.
        let offset = |word: usize| {
            U256::from_be_slice(&encoded[word * 32..(word + 1) * 32]).to::<usize>()
        };
        let (data, to, value) = (offset(0), offset(1), offset(2));
        assert!(data < to && to < value);
        // `address[]`: length, then the address.
        assert_eq!(encoded[to + 31], 1);
        assert_eq!(&encoded[to + 44..to + 64], call.to.as_slice());
        // `uint256[]`: length, then the value.
        assert_eq!(encoded[value + 31], 1);
        assert_eq!(encoded[value + 63], 5);

        assert_eq!(decode_calls(&encoded).unwrap(), vec![call]);
    }
}
