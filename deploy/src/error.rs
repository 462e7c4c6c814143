use {loader_client::transport::TransportError, thiserror::Error};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("chunk capacity must be greater than zero")]
    InvalidChunkCapacity,

    #[error("payload is empty; nothing to deploy")]
    EmptyPayload,

    #[error(
        "deployment costs {required} units but the signer holds {balance}; \
         the staging deposit is refunded at the end{hint}"
    )]
    InsufficientFunds {
        required: u64,
        balance: u64,
        hint: String,
    },

    #[error("initial deployment requires the program keypair, not just its address")]
    MissingProgramKeypair,

    #[error(
        "entered program address does not match the address derived from the \
         program keypair; initial deployment can only be done from a keypair"
    )]
    ProgramAddressMismatch,

    #[error("incorrect program id for finalization")]
    IncorrectProgramId,

    #[error("insufficient balance to complete deployment")]
    InsufficientFundsForDeploy,

    #[error(
        "exceeded maximum retries ({0}) while creating the staging buffer; \
         change network endpoint and try again"
    )]
    MaxRetriesExceeded(u32),

    #[error("deployment did not confirm after {0} attempts; retry or report the issue")]
    RetriesExhausted(u32),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DeployError {
    pub fn insufficient_funds(required: u64, balance: u64, airdrop: Option<u64>) -> Self {
        let hint = match airdrop {
            Some(amount) => format!("; request an airdrop of {amount} units to top up"),
            None => String::new(),
        };
        Self::InsufficientFunds {
            required,
            balance,
            hint,
        }
    }
}
