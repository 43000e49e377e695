//! Achievement progress, points and levels.
//!
//! # Data Flow
//! ```text
//! storage (transactions, wallets, assets, stored progress)
//!     → Activity (counts, held assets, portfolio value)
//!     → progress per catalog entry (0..=100)
//!     → first time at 100: persist with unlocked_at
//!     → points / level summary
//! ```
//!
//! Manual achievements keep whatever progress was last set through the API.

pub mod catalog;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::portfolio;
use crate::storage::{Storage, StorageError, TransactionStatus, TransactionType, UserAchievement};

pub use catalog::{find, Achievement, Category, Rule, Tier, CATALOG};

/// Points needed per level.
pub const POINTS_PER_LEVEL: u32 = 100;

#[derive(Debug, Error)]
pub enum AchievementError {
    #[error("Achievement not found")]
    UnknownAchievement,

    #[error("Achievement progress is computed automatically")]
    NotManual,

    #[error("User not found")]
    UnknownUser,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Facts about a user that computed achievements are measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub transaction_count: u32,
    pub completed_count: u32,
    pub assets_held: u32,
    /// Oldest completed receive of an asset that still has a balance.
    pub holding_since: Option<DateTime<Utc>>,
    pub portfolio_value: f64,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementWithProgress {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub rarity: Tier,
    pub points: u32,
    pub progress: u8,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub achievements: Vec<AchievementWithProgress>,
    pub total_points: u32,
    pub level: u32,
    pub next_level_points: u32,
    pub level_progress: f64,
}

fn ratio(value: f64, target: f64) -> u8 {
    if target <= 0.0 {
        return 100;
    }
    (value / target * 100.0).clamp(0.0, 100.0).floor() as u8
}

/// Progress of a computed rule. `None` for manual rules.
pub fn computed_progress(
    rule: Rule,
    activity: &Activity,
    launch_date: NaiveDate,
    now: DateTime<Utc>,
) -> Option<u8> {
    let progress = match rule {
        Rule::Transactions(n) => ratio(activity.transaction_count as f64, n as f64),
        Rule::CompletedTransactions(n) => ratio(activity.completed_count as f64, n as f64),
        Rule::AssetsHeld(n) => ratio(activity.assets_held as f64, n as f64),
        Rule::HoldDays(days) => {
            let held = activity
                .holding_since
                .map_or(0, |since| (now - since).num_days().max(0));
            ratio(held as f64, days as f64)
        }
        Rule::PortfolioValue(target) => ratio(activity.portfolio_value, target),
        Rule::RegisteredWithinDays(days) => {
            let joined = activity.registered_at.date_naive();
            let offset = (joined - launch_date).num_days();
            if (0..=days as i64).contains(&offset) {
                100
            } else {
                0
            }
        }
        Rule::Manual => return None,
    };
    Some(progress)
}

pub fn level_for(points: u32) -> u32 {
    points / POINTS_PER_LEVEL + 1
}

pub fn next_level_points(level: u32) -> u32 {
    level * POINTS_PER_LEVEL
}

/// Percentage of the way from the current level to the next.
pub fn level_progress(points: u32) -> f64 {
    let floor = (level_for(points) - 1) * POINTS_PER_LEVEL;
    (points - floor) as f64 / POINTS_PER_LEVEL as f64 * 100.0
}

/// Merge computed and stored progress into the response view.
pub fn summarize(
    activity: &Activity,
    stored: &[UserAchievement],
    launch_date: NaiveDate,
    now: DateTime<Utc>,
) -> UserProgress {
    let stored: HashMap<&str, &UserAchievement> =
        stored.iter().map(|s| (s.achievement_id.as_str(), s)).collect();

    let achievements: Vec<AchievementWithProgress> = CATALOG
        .iter()
        .map(|a| {
            let record = stored.get(a.id);
            let unlocked_at = record.and_then(|r| r.unlocked_at);
            let progress = match computed_progress(a.rule, activity, launch_date, now) {
                Some(_) if unlocked_at.is_some() => 100,
                Some(p) => p,
                None => record.map_or(0, |r| r.progress.min(100)),
            };
            let is_completed = progress >= 100;
            AchievementWithProgress {
                id: a.id,
                name: a.title,
                description: a.description,
                icon: a.icon,
                category: a.category,
                rarity: a.tier,
                points: a.points,
                progress,
                is_completed,
                unlocked_at: if is_completed { unlocked_at.or(Some(now)) } else { None },
            }
        })
        .collect();

    let total_points = achievements
        .iter()
        .filter(|a| a.is_completed)
        .map(|a| a.points)
        .sum();
    let level = level_for(total_points);

    UserProgress {
        achievements,
        total_points,
        level,
        next_level_points: next_level_points(level),
        level_progress: level_progress(total_points),
    }
}

/// Gather the activity facts for one user.
pub async fn load_activity(storage: &dyn Storage, user_id: i32) -> Result<Activity, AchievementError> {
    let user = storage
        .get_user(user_id)
        .await?
        .ok_or(AchievementError::UnknownUser)?;
    let transactions = storage.transactions_for_user(user_id, None).await?;
    let holdings = portfolio::load_wallet_assets(storage, user_id).await?;
    let wallets = storage.wallets_for_user(user_id).await?;

    let held: HashSet<i32> = wallets
        .iter()
        .filter(|w| w.balance > 0.0)
        .map(|w| w.asset_id)
        .collect();
    let holding_since = transactions
        .iter()
        .filter(|t| {
            t.kind == TransactionType::Receive
                && t.status == TransactionStatus::Completed
                && held.contains(&t.asset_id)
        })
        .map(|t| t.created_at)
        .min();

    Ok(Activity {
        transaction_count: transactions.len() as u32,
        completed_count: transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .count() as u32,
        assets_held: held.len() as u32,
        holding_since,
        portfolio_value: holdings.iter().map(|h| h.value).sum(),
        registered_at: user.created_at,
    })
}

/// Evaluate every achievement for a user, persisting new unlocks.
pub async fn evaluate(
    storage: &dyn Storage,
    user_id: i32,
    launch_date: NaiveDate,
) -> Result<UserProgress, AchievementError> {
    let activity = load_activity(storage, user_id).await?;
    let stored = storage.user_achievements(user_id).await?;
    let now = Utc::now();
    let progress = summarize(&activity, &stored, launch_date, now);

    let already_unlocked: HashSet<&str> = stored
        .iter()
        .filter(|s| s.unlocked_at.is_some())
        .map(|s| s.achievement_id.as_str())
        .collect();
    for a in progress.achievements.iter().filter(|a| a.is_completed) {
        if already_unlocked.contains(a.id) {
            continue;
        }
        storage
            .upsert_user_achievement(UserAchievement {
                user_id,
                achievement_id: a.id.to_string(),
                progress: 100,
                unlocked_at: a.unlocked_at,
            })
            .await?;
        tracing::info!(user_id, achievement = a.id, points = a.points, "Achievement unlocked");
    }

    Ok(progress)
}

/// Record progress for a manual achievement.
pub async fn set_manual_progress(
    storage: &dyn Storage,
    user_id: i32,
    achievement_id: &str,
    progress: u8,
) -> Result<UserAchievement, AchievementError> {
    let achievement = find(achievement_id).ok_or(AchievementError::UnknownAchievement)?;
    if achievement.rule != Rule::Manual {
        return Err(AchievementError::NotManual);
    }
    if storage.get_user(user_id).await?.is_none() {
        return Err(AchievementError::UnknownUser);
    }

    let progress = progress.min(100);
    let record = storage
        .upsert_user_achievement(UserAchievement {
            user_id,
            achievement_id: achievement.id.to_string(),
            progress,
            unlocked_at: (progress == 100).then(Utc::now),
        })
        .await?;
    Ok(record)
}
