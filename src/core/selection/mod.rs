//! # Selection Module
//!
//! Worst-first paging over the scored list.
//!
//! Every id handed out is remembered in a seen set, so repeated "show me
//! more" calls walk down the ranking instead of offering the same photos
//! again. The seen set outlives rescans on purpose: a photo the user
//! already judged stays judged until they explicitly start over.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::library::AssetId;

/// Deletion candidates offered per selection round
pub const REVIEW_PAGE_SIZE: usize = 12;

/// An analyzed asset ready for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAsset {
    pub asset_id: AssetId,
    /// Badness score from the oracle; higher means a stronger deletion
    /// candidate
    pub final_score: f64,
}

/// Pages through scored assets worst-first, never offering an id twice.
#[derive(Debug, Default)]
pub struct ScoreSelector {
    seen: HashSet<AssetId>,
}

impl ScoreSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next page of deletion candidates.
    ///
    /// Ids already offered and ids in the caller's `excluded` set are
    /// filtered out, the rest stable-sorted by score descending (equal
    /// scores keep their scan order) and the top
    /// [`REVIEW_PAGE_SIZE`] returned. Returned ids are recorded as seen
    /// before this method returns; excluded ids are not.
    pub fn select(
        &mut self,
        scored: &[ScoredAsset],
        excluded: &HashSet<AssetId>,
    ) -> Vec<ScoredAsset> {
        let mut eligible: Vec<&ScoredAsset> = scored
            .iter()
            .filter(|asset| {
                !self.seen.contains(&asset.asset_id) && !excluded.contains(&asset.asset_id)
            })
            .collect();

        // total_cmp gives a total order even for pathological scores, and
        // the sort's stability keeps ties in scan order.
        eligible.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        let page: Vec<ScoredAsset> = eligible
            .into_iter()
            .take(REVIEW_PAGE_SIZE)
            .cloned()
            .collect();
        for asset in &page {
            self.seen.insert(asset.asset_id.clone());
        }
        page
    }

    /// Forget every previously offered id.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn is_seen(&self, id: &AssetId) -> bool {
        self.seen.contains(id)
    }
}
