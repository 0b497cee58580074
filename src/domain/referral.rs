//! Referral forest statistics.
//!
//! Users point at their referrer through `referred_by`. Every user whose
//! referrer is unset (or no longer exists) roots a tree; the statistics
//! below are computed over the materialized adjacency list with an explicit
//! stack, so deep chains never recurse and a `referred_by` cycle can't loop.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{
    fields::UserId,
    model::{RecentReferral, ReferralEdgeRow, ReferralTotals, TopReferrer},
    report::ReferredComparison,
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralChain {
    pub root: UserId,
    /// Transitive descendants of `root`.
    pub chain_size: usize,
    /// Longest root-to-descendant path, in edges.
    pub max_depth: usize,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthCount {
    pub depth: usize,
    pub users: usize,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestStats {
    pub chains: Vec<ReferralChain>,
    pub depth_distribution: Vec<DepthCount>,
    /// Users no root reaches, i.e. members of (or hanging below) a cycle.
    pub cyclic_user_ids: Vec<UserId>,
}

pub struct ReferralForest {
    users: Vec<UserId>,
    parents: HashMap<UserId, Option<UserId>>,
    children: HashMap<UserId, Vec<UserId>>,
}

impl ReferralForest {
    pub fn new(edges: impl IntoIterator<Item = (UserId, Option<UserId>)>) -> Self {
        let parents: HashMap<UserId, Option<UserId>> = edges.into_iter().collect();

        let mut users: Vec<UserId> = parents.keys().copied().collect();
        users.sort();

        let mut children: HashMap<UserId, Vec<UserId>> = HashMap::new();
        for user in &users {
            if let Some(Some(parent)) = parents.get(user) {
                if parents.contains_key(parent) {
                    children.entry(*parent).or_default().push(*user);
                }
            }
        }
        for kids in children.values_mut() {
            kids.sort();
        }

        Self {
            users,
            parents,
            children,
        }
    }

    fn is_root(&self, user: &UserId) -> bool {
        match self.parents.get(user) {
            Some(Some(parent)) => !self.parents.contains_key(parent),
            _ => true,
        }
    }

    pub fn roots(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|user| self.is_root(user))
            .copied()
            .collect()
    }

    /// Walks every tree once. Chains are listed for roots with at least one
    /// descendant, largest first.
    pub fn stats(&self) -> ForestStats {
        let mut visited: HashSet<UserId> = HashSet::with_capacity(self.users.len());
        let mut depths: BTreeMap<usize, usize> = BTreeMap::new();
        let mut chains = Vec::new();

        for root in self.roots() {
            let mut chain_size = 0;
            let mut max_depth = 0;
            let mut stack = vec![(root, 0usize)];

            while let Some((user, depth)) = stack.pop() {
                if !visited.insert(user) {
                    continue;
                }
                *depths.entry(depth).or_default() += 1;
                if depth > 0 {
                    chain_size += 1;
                }
                max_depth = max_depth.max(depth);

                if let Some(kids) = self.children.get(&user) {
                    stack.extend(kids.iter().map(|kid| (*kid, depth + 1)));
                }
            }

            if chain_size > 0 {
                chains.push(ReferralChain {
                    root,
                    chain_size,
                    max_depth,
                });
            }
        }

        chains.sort_by(|a, b| {
            b.chain_size
                .cmp(&a.chain_size)
                .then(b.max_depth.cmp(&a.max_depth))
                .then(a.root.cmp(&b.root))
        });

        let cyclic_user_ids: Vec<UserId> = self
            .users
            .iter()
            .filter(|user| !visited.contains(user))
            .copied()
            .collect();
        if !cyclic_user_ids.is_empty() {
            tracing::warn!(
                "referral cycle detected, {} users unreachable from any root",
                cyclic_user_ids.len()
            );
        }

        ForestStats {
            chains,
            depth_distribution: depths
                .into_iter()
                .map(|(depth, users)| DepthCount { depth, users })
                .collect(),
            cyclic_user_ids,
        }
    }
}

impl From<Vec<ReferralEdgeRow>> for ReferralForest {
    fn from(rows: Vec<ReferralEdgeRow>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|row| (UserId::from(row.id), row.referred_by.map(UserId::from))),
        )
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReferralReport {
    pub totals: ReferralTotals,
    pub top_referrers: Vec<TopReferrer>,
    #[serde(flatten)]
    pub forest: ForestStats,
    pub comparison: ReferredComparison,
    pub recent_referrals: Vec<RecentReferral>,
}
