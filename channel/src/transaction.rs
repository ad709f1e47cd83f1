use serde::{Deserialize, Serialize};

/// Whether an on-chain transaction the dispatcher submitted has resolved
/// yet, and how. `finished_block_number == None` means the transaction is
/// still outstanding ("running" in §4.D's status derivation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExecutionStatus {
    pub started_block_number: u64,
    pub finished_block_number: Option<u64>,
    pub result: Option<TransactionResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionResult {
    Success,
    Failure,
}

impl TransactionExecutionStatus {
    pub fn started(block_number: u64) -> Self {
        Self { started_block_number: block_number, finished_block_number: None, result: None }
    }

    pub fn is_running(&self) -> bool {
        self.finished_block_number.is_none()
    }

    pub fn finish(&mut self, block_number: u64, result: TransactionResult) {
        self.finished_block_number = Some(block_number);
        self.result = Some(result);
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.result, Some(TransactionResult::Success))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.result, Some(TransactionResult::Failure))
    }
}
