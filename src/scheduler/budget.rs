// ABOUTME: Per-user concurrency budget with processing latch and active campaign rotation
// ABOUTME: In-memory cache rebuilt from the durable store on first touch after process start
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Per-user budget state
///
/// Mutation is serialized by the per-user entry mutex; slot acquisition
/// additionally happens only under the processing latch, which is what
/// rules out transient cap overshoot.
#[derive(Debug)]
pub struct UserBudget {
    pub user_id: Uuid,
    /// Calls currently holding a slot
    pub active_calls: u32,
    /// Cap refreshed from user settings on every processing pass
    pub max_concurrent_calls: u32,
    /// Single-writer latch excluding re-entrant processing for this user
    pub is_processing: bool,
    /// Active outbound campaigns in rotation order
    active_campaigns: Vec<Uuid>,
    /// Round-robin cursor into `active_campaigns`
    cursor: usize,
}

impl UserBudget {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        active_calls: u32,
        max_concurrent_calls: u32,
        active_campaigns: Vec<Uuid>,
    ) -> Self {
        Self {
            user_id,
            active_calls,
            max_concurrent_calls,
            is_processing: false,
            active_campaigns,
            cursor: 0,
        }
    }

    /// Slots still available under the cap
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.max_concurrent_calls.saturating_sub(self.active_calls)
    }

    /// Take one slot
    pub fn acquire(&mut self) {
        self.active_calls += 1;
    }

    /// Return one slot, floored at zero against double-release
    pub fn release(&mut self) {
        self.active_calls = self.active_calls.saturating_sub(1);
    }

    /// Campaigns in round-robin order starting at the cursor
    #[must_use]
    pub fn rotation(&self) -> Vec<Uuid> {
        let len = self.active_campaigns.len();
        if len == 0 {
            return Vec::new();
        }
        let cursor = self.cursor % len;
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.active_campaigns[cursor..]);
        out.extend_from_slice(&self.active_campaigns[..cursor]);
        out
    }

    /// Move the cursor past the campaign just visited
    pub fn advance_cursor(&mut self) {
        let len = self.active_campaigns.len();
        if len > 0 {
            self.cursor = (self.cursor + 1) % len;
        }
    }

    /// Add a campaign to the rotation if not already present
    pub fn add_campaign(&mut self, campaign_id: Uuid) {
        if !self.active_campaigns.contains(&campaign_id) {
            self.active_campaigns.push(campaign_id);
        }
    }

    /// Drop a campaign from the rotation
    pub fn remove_campaign(&mut self, campaign_id: Uuid) {
        if let Some(idx) = self.active_campaigns.iter().position(|id| *id == campaign_id) {
            self.active_campaigns.remove(idx);
            if idx < self.cursor {
                self.cursor -= 1;
            }
            let len = self.active_campaigns.len();
            if len > 0 {
                self.cursor %= len;
            } else {
                self.cursor = 0;
            }
        }
    }

    #[must_use]
    pub fn active_campaigns(&self) -> &[Uuid] {
        &self.active_campaigns
    }
}

/// Operator-facing snapshot of one budget entry
#[derive(Debug, Clone, Serialize)]
pub struct BudgetView {
    pub user_id: Uuid,
    pub active_calls: u32,
    pub max_concurrent_calls: u32,
    pub is_processing: bool,
    pub active_campaigns: Vec<Uuid>,
}

/// Process-wide registry of budget entries
///
/// The coarse mutex serializes map shape changes only; per-user state is
/// guarded by each entry's own mutex.
#[derive(Default)]
pub struct BudgetRegistry {
    entries: Mutex<HashMap<Uuid, Arc<Mutex<UserBudget>>>>,
}

impl BudgetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a user's entry if one exists
    pub async fn get(&self, user_id: Uuid) -> Option<Arc<Mutex<UserBudget>>> {
        self.entries.lock().await.get(&user_id).cloned()
    }

    /// Insert a freshly rebuilt entry unless a concurrent rebuild won
    pub async fn insert_if_absent(
        &self,
        user_id: Uuid,
        budget: UserBudget,
    ) -> Arc<Mutex<UserBudget>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(budget)))
            .clone()
    }

    /// Snapshot all entries for introspection
    pub async fn snapshot(&self) -> Vec<BudgetView> {
        let entries: Vec<Arc<Mutex<UserBudget>>> =
            self.entries.lock().await.values().cloned().collect();

        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let budget = entry.lock().await;
            views.push(BudgetView {
                user_id: budget.user_id,
                active_calls: budget.active_calls,
                max_concurrent_calls: budget.max_concurrent_calls,
                is_processing: budget.is_processing,
                active_campaigns: budget.active_campaigns().to_vec(),
            });
        }
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_and_release_floor() {
        let mut budget = UserBudget::new(Uuid::new_v4(), 0, 2, Vec::new());
        assert_eq!(budget.available(), 2);
        budget.acquire();
        budget.acquire();
        assert_eq!(budget.available(), 0);
        budget.release();
        budget.release();
        budget.release(); // double-release stays floored
        assert_eq!(budget.active_calls, 0);
        assert_eq!(budget.available(), 2);
    }

    #[test]
    fn test_rotation_round_robin() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut budget = UserBudget::new(Uuid::new_v4(), 0, 1, vec![a, b]);

        assert_eq!(budget.rotation(), vec![a, b]);
        budget.advance_cursor();
        assert_eq!(budget.rotation(), vec![b, a]);
        budget.advance_cursor();
        assert_eq!(budget.rotation(), vec![a, b]);
    }

    #[test]
    fn test_remove_campaign_keeps_cursor_consistent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut budget = UserBudget::new(Uuid::new_v4(), 0, 1, vec![a, b, c]);
        budget.advance_cursor();
        budget.advance_cursor(); // cursor at c
        budget.remove_campaign(a);
        assert_eq!(budget.rotation()[0], c);
        budget.remove_campaign(c);
        assert_eq!(budget.rotation(), vec![b]);
        budget.remove_campaign(b);
        assert!(budget.rotation().is_empty());
    }
}
