//! Fair-share accounting group (§3 "Group").

use std::collections::HashSet;

use crate::runnable::RunnableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

pub const ROOT_GROUP: GroupId = GroupId(0);

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub weight: u32,
    pub members: HashSet<RunnableId>,
    /// Accumulated virtual time: `v += executed_ticks / weight`.
    pub virtual_time: f64,
    pub parent: Option<GroupId>,
}

impl Group {
    pub fn new(id: GroupId, weight: u32, parent: Option<GroupId>) -> Self {
        Self {
            id,
            weight: weight.max(1),
            members: HashSet::new(),
            virtual_time: 0.0,
            parent,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_GROUP, 1, None)
    }

    pub fn accrue(&mut self, executed_ticks: u64) {
        self.virtual_time += executed_ticks as f64 / self.weight as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_weight_accrues_virtual_time_more_slowly() {
        let mut light = Group::new(GroupId(1), 1, None);
        let mut heavy = Group::new(GroupId(2), 4, None);
        light.accrue(8);
        heavy.accrue(8);
        assert!(heavy.virtual_time < light.virtual_time);
    }
}
