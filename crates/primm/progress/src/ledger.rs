//! Coin/XP crediting and level recomputation.

use crate::{ProgressError, ProgressResult};
use chrono::{DateTime, Utc};
use primm_storage::PrimmStorage;
use primm_types::{level_for_xp, Reward, StageId, UserAccount, UserId};
use std::sync::Arc;

/// Account state after a credit.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub account: UserAccount,
    /// New level when the credit moved the user up, otherwise `None`
    pub new_level: Option<i32>,
}

/// Applies rewards to user accounts.
pub struct RewardLedger {
    storage: Arc<dyn PrimmStorage>,
}

impl RewardLedger {
    pub fn new(storage: Arc<dyn PrimmStorage>) -> Self {
        Self { storage }
    }

    /// Credit `reward` additively. Does not touch the level.
    pub async fn credit(&self, user_id: UserId, reward: Reward) -> ProgressResult<UserAccount> {
        self.storage
            .credit_account(user_id, reward.coins, reward.xp)
            .await
            .map_err(ProgressError::storage("credit account"))
    }

    /// Derive the level from total XP and persist it if it is higher than the
    /// stored one. Returns the account as stored afterwards.
    pub async fn recompute_level(&self, user_id: UserId) -> ProgressResult<UserAccount> {
        let account = self
            .storage
            .get_account(user_id)
            .await
            .map_err(ProgressError::storage("load account"))?
            .ok_or_else(|| {
                ProgressError::NotFound(format!("account {} not found", user_id.get()))
            })?;

        let derived = level_for_xp(account.experience_points);
        if derived <= account.level {
            return Ok(account);
        }
        self.storage
            .raise_level(user_id, derived)
            .await
            .map_err(ProgressError::storage("raise level"))
    }

    /// Credit `reward`, then recompute the level.
    pub async fn award(&self, user_id: UserId, reward: Reward) -> ProgressResult<LedgerEntry> {
        let credited = self.credit(user_id, reward).await?;
        self.settle(user_id, credited).await
    }

    /// Claim the one-time reward of a stage and credit it in a single storage
    /// step, then recompute the level. Returns `None` when the reward had
    /// already been claimed.
    pub async fn award_once(
        &self,
        user_id: UserId,
        stage_id: StageId,
        reward: Reward,
        at: DateTime<Utc>,
    ) -> ProgressResult<Option<LedgerEntry>> {
        let credited = self
            .storage
            .claim_and_credit(user_id, stage_id, reward, at)
            .await
            .map_err(ProgressError::storage("claim stage reward"))?;
        match credited {
            Some(account) => self.settle(user_id, account).await.map(Some),
            None => Ok(None),
        }
    }

    async fn settle(&self, user_id: UserId, credited: UserAccount) -> ProgressResult<LedgerEntry> {
        let account = self.recompute_level(user_id).await?;
        let new_level = (account.level > credited.level).then_some(account.level);
        if let Some(level) = new_level {
            tracing::info!(user_id = %user_id, level, "User levelled up");
        }
        Ok(LedgerEntry { account, new_level })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primm_storage::{AccountStore, CompletionStore, InMemoryPrimmStorage};
    use primm_types::{CompletionPatch, StageType};

    async fn ledger_with_user(user: UserId) -> (RewardLedger, Arc<InMemoryPrimmStorage>) {
        let storage = Arc::new(InMemoryPrimmStorage::new());
        storage.insert_account(UserAccount::new(user, "Rina")).await;
        (RewardLedger::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn level_follows_xp_thresholds() {
        let user = UserId::new(1);
        let (ledger, _) = ledger_with_user(user).await;

        let entry = ledger.award(user, Reward::new(0, 99)).await.unwrap();
        assert_eq!(entry.account.level, 1);
        assert_eq!(entry.new_level, None);

        let entry = ledger.award(user, Reward::new(0, 1)).await.unwrap();
        assert_eq!(entry.account.level, 2);
        assert_eq!(entry.new_level, Some(2));

        let entry = ledger.award(user, Reward::new(0, 150)).await.unwrap();
        assert_eq!(entry.account.experience_points, 250);
        assert_eq!(entry.account.level, 3);
    }

    #[tokio::test]
    async fn level_is_never_lowered() {
        let user = UserId::new(2);
        let (ledger, storage) = ledger_with_user(user).await;
        storage.raise_level(user, 7).await.unwrap();

        let entry = ledger.award(user, Reward::new(10, 20)).await.unwrap();
        assert_eq!(entry.account.level, 7);
        assert_eq!(entry.new_level, None);
    }

    #[tokio::test]
    async fn credit_is_additive() {
        let user = UserId::new(3);
        let (ledger, _) = ledger_with_user(user).await;
        ledger.credit(user, Reward::new(50, 20)).await.unwrap();
        let account = ledger.credit(user, Reward::new(75, 30)).await.unwrap();
        assert_eq!(account.total_coins, 125);
        assert_eq!(account.experience_points, 50);
    }

    #[tokio::test]
    async fn stage_reward_is_awarded_once() {
        let user = UserId::new(4);
        let (ledger, storage) = ledger_with_user(user).await;
        let stage = StageId::new(2);
        storage
            .upsert_completion(
                user,
                stage,
                CompletionPatch::new(StageType::Run, true, 100),
                Utc::now(),
            )
            .await
            .unwrap();

        let first = ledger
            .award_once(user, stage, Reward::new(50, 120), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.new_level, Some(2));

        let second = ledger
            .award_once(user, stage, Reward::new(50, 120), Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());
        let account = storage.get_account(user).await.unwrap().unwrap();
        assert_eq!(account.total_coins, 50);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (ledger, _) = ledger_with_user(UserId::new(1)).await;
        let result = ledger.credit(UserId::new(404), Reward::new(1, 1)).await;
        assert!(matches!(result, Err(ProgressError::NotFound(_))));
    }
}
