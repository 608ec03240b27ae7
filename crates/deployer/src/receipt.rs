//! Typed access to the events of a mined transaction.

use {crate::node::Receipt, alloy::sol_types::SolEvent};

/// Every log of the receipt emitted as `E`, in log order. Logs that share the
/// event signature but do not decode as `E` are skipped.
pub fn events<E: SolEvent>(receipt: &Receipt) -> Vec<E> {
    receipt
        .logs
        .iter()
        .filter(|log| log.data.topics().first() == Some(&E::SIGNATURE_HASH))
        .filter_map(|log| match E::decode_log_data(&log.data) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(
                    ?err,
                    emitter = ?log.address,
                    event = E::SIGNATURE,
                    "undecodable log"
                );
                None
            }
        })
        .collect()
}

/// The first `E` event of the receipt.
pub fn first<E: SolEvent>(receipt: &Receipt) -> Option<E> {
    events(receipt).into_iter().next()
}
