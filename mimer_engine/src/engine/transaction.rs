/// How a transaction is ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Rollback,
}

impl TransactionEnd {
    pub fn is_rollback(self) -> bool {
        matches!(self, Self::Rollback)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }
}

impl From<bool> for TransactionEnd {
    /// `true` means roll back, matching the flag of the native call.
    fn from(rollback: bool) -> Self {
        if rollback {
            Self::Rollback
        } else {
            Self::Commit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_end_flag() {
        assert!(TransactionEnd::Rollback.is_rollback());
        assert!(!TransactionEnd::Commit.is_rollback());
        assert_eq!(TransactionEnd::from(true), TransactionEnd::Rollback);
        assert_eq!(TransactionEnd::from(false).as_str(), "commit");
    }
}
