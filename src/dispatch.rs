use crate::{
    contract::ContractCall,
    provider::{
        CallOutcome,
        ContractCallRequest,
        PostConditionMode,
        TxId,
        WalletProvider,
    },
    session::Session,
};
use tracing::debug;

/// Result of a sequential batch. `tx_ids` holds the ids of the calls that
/// went through, in order; `halted_at` is the index of the call that did not.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchOutcome {
    pub tx_ids: Vec<TxId>,
    pub halted_at: Option<usize>,
}

impl BatchOutcome {
    pub fn completed(&self) -> bool {
        self.halted_at.is_none()
    }
}

impl<W: WalletProvider> Session<W> {
    /// Never fails: a cancelled prompt, a wallet error and a missing session
    /// all come back as `None`.
    pub async fn dispatch(&mut self, call: ContractCall) -> Option<TxId> {
        if self.account().is_none() || self.network().is_none() {
            debug!(function = call.function_name, "dispatch skipped, no wallet session");
            return None;
        }
        let function = call.function_name;
        let request = ContractCallRequest {
            call,
            post_condition_mode: PostConditionMode::Allow,
        };
        match self.wallet_mut().open_contract_call(request).await {
            Ok(CallOutcome::Finished { tx_id }) => {
                debug!(function, %tx_id, "contract call finished");
                Some(tx_id)
            }
            Ok(CallOutcome::Cancelled) => {
                debug!(function, "contract call cancelled");
                None
            }
            Err(err) => {
                debug!(function, error = %err, "contract call failed");
                None
            }
        }
    }

    /// Sends calls one after another, stopping at the first one that does
    /// not produce a transaction id.
    pub async fn dispatch_batch(
        &mut self,
        calls: impl IntoIterator<Item = ContractCall>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, call) in calls.into_iter().enumerate() {
            match self.dispatch(call).await {
                Some(tx_id) => outcome.tx_ids.push(tx_id),
                None => {
                    outcome.halted_at = Some(index);
                    break;
                }
            }
        }
        outcome
    }
}
