use crate::domain::batch::WriteBatch;
use crate::domain::ports::RepositoryRef;
use crate::domain::student::{Amount, Student, StudentId};
use crate::error::{DomainError, StoreError, TransferError};

/// Moves balance between two students.
///
/// The withdrawal and the deposit are committed as one [`WriteBatch`]; either
/// both balances change or neither does.
pub struct AccountTransferService {
    repository: RepositoryRef,
    max_conflict_retries: u32,
}

impl AccountTransferService {
    pub fn new(repository: RepositoryRef, max_conflict_retries: u32) -> Self {
        Self {
            repository,
            max_conflict_retries,
        }
    }

    /// Transfers `amount` from `from` to `to`.
    ///
    /// Retries from a fresh read when the store reports that either student
    /// changed concurrently, up to the configured retry limit.
    pub async fn transfer(
        &self,
        from: StudentId,
        to: StudentId,
        amount: i64,
    ) -> Result<(), TransferError> {
        let amount = Amount::new(amount).map_err(|_| TransferError::InvalidAmount(amount))?;
        if from == to {
            return Err(TransferError::SameStudent(from));
        }

        let mut attempt = 0;
        loop {
            let batch = self.prepare(from, to, amount).await?;
            match self.repository.commit(batch).await {
                Ok(()) => {
                    tracing::info!(from, to, amount = amount.value(), "transfer committed");
                    return Ok(());
                }
                Err(StoreError::Conflict(reason)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(from, to, attempt, %reason, "transfer conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn prepare(
        &self,
        from: StudentId,
        to: StudentId,
        amount: Amount,
    ) -> Result<WriteBatch, TransferError> {
        let mut source = self.load(from).await?;
        let mut destination = self.load(to).await?;

        source.withdraw(amount).map_err(|err| match err {
            DomainError::InsufficientFunds { balance, requested } => {
                TransferError::InsufficientFunds {
                    student: from,
                    balance,
                    requested,
                }
            }
            _ => TransferError::InvalidAmount(amount.value() as i64),
        })?;
        destination
            .deposit(amount)
            .map_err(|_| TransferError::BalanceOverflow(to))?;

        let mut batch = WriteBatch::new();
        batch.update_student(source).update_student(destination);
        Ok(batch)
    }

    async fn load(&self, id: StudentId) -> Result<Student, TransferError> {
        self.repository
            .get_student(id)
            .await?
            .ok_or(TransferError::StudentNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{BatchWriter, StudentStore};
    use crate::domain::student::Balance;
    use crate::error::ErrorKind;
    use crate::infrastructure::in_memory::InMemoryRepository;
    use std::sync::Arc;

    async fn service_with(
        balances: &[(StudentId, u64)],
    ) -> (AccountTransferService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        for &(id, balance) in balances {
            repo.store_student(Student::new(id, format!("student-{id}"), Balance::new(balance)))
                .await
                .unwrap();
        }
        (AccountTransferService::new(Arc::new(repo.clone()), 3), repo)
    }

    async fn balance(repo: &InMemoryRepository, id: StudentId) -> u64 {
        repo.get_student(id).await.unwrap().unwrap().balance.value()
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let (service, repo) = service_with(&[(1, 50), (2, 40), (3, 7)]).await;
        service.transfer(1, 2, 15).await.unwrap();

        assert_eq!(balance(&repo, 1).await, 35);
        assert_eq!(balance(&repo, 2).await, 55);
        assert_eq!(balance(&repo, 3).await, 7);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_both_balances() {
        let (service, repo) = service_with(&[(1, 10), (2, 40)]).await;
        let err = service.transfer(1, 2, 15).await.unwrap_err();

        assert!(matches!(
            err,
            TransferError::InsufficientFunds {
                student: 1,
                requested: 15,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(balance(&repo, 1).await, 10);
        assert_eq!(balance(&repo, 2).await, 40);
    }

    #[tokio::test]
    async fn test_transfer_entire_balance() {
        let (service, repo) = service_with(&[(1, 10), (2, 0)]).await;
        service.transfer(1, 2, 10).await.unwrap();
        assert_eq!(balance(&repo, 1).await, 0);
        assert_eq!(balance(&repo, 2).await, 10);
    }

    #[tokio::test]
    async fn test_invalid_amounts() {
        let (service, _repo) = service_with(&[(1, 10), (2, 40)]).await;
        for amount in [0, -1, i64::MIN] {
            let err = service.transfer(1, 2, amount).await.unwrap_err();
            assert!(matches!(err, TransferError::InvalidAmount(a) if a == amount));
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[tokio::test]
    async fn test_same_student_rejected() {
        let (service, repo) = service_with(&[(1, 10)]).await;
        let err = service.transfer(1, 1, 5).await.unwrap_err();
        assert!(matches!(err, TransferError::SameStudent(1)));
        assert_eq!(balance(&repo, 1).await, 10);
    }

    #[tokio::test]
    async fn test_missing_students() {
        let (service, repo) = service_with(&[(1, 10)]).await;
        let err = service.transfer(1, 9, 5).await.unwrap_err();
        assert!(matches!(err, TransferError::StudentNotFound(9)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(balance(&repo, 1).await, 10);

        let err = service.transfer(9, 1, 5).await.unwrap_err();
        assert!(matches!(err, TransferError::StudentNotFound(9)));
    }

    #[tokio::test]
    async fn test_deposit_overflow_leaves_both_balances() {
        let (service, repo) = service_with(&[(1, 10), (2, u64::MAX)]).await;
        let err = service.transfer(1, 2, 5).await.unwrap_err();
        assert!(matches!(err, TransferError::BalanceOverflow(2)));
        assert_eq!(balance(&repo, 1).await, 10);
        assert_eq!(balance(&repo, 2).await, u64::MAX);
    }

    #[tokio::test]
    async fn test_transfer_after_concurrent_update_uses_fresh_balance() {
        let (service, repo) = service_with(&[(1, 10), (2, 0)]).await;

        // Another writer drains the source between transfers.
        let mut source = repo.get_student(1).await.unwrap().unwrap();
        source.balance = Balance::new(3);
        let mut batch = WriteBatch::new();
        batch.update_student(source);
        repo.commit(batch).await.unwrap();

        let err = service.transfer(1, 2, 5).await.unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));
        assert_eq!(balance(&repo, 1).await, 3);
        assert_eq!(balance(&repo, 2).await, 0);
    }
}
