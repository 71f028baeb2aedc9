//! Ordered, append/pop-only list of attacked branches.

use sequin_core::BranchId;

use crate::error::AttackError;

/// Branches removed so far, in attack order.
///
/// Entries are distinct and never more than `budget`. The only mutations are
/// [`push`](Self::push), [`pop_last`](Self::pop_last) and
/// [`clear`](Self::clear); the order is never rearranged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackSequence {
    edges: Vec<BranchId>,
    budget: usize,
}

impl AttackSequence {
    pub fn new(budget: usize) -> Self {
        Self {
            edges: Vec::with_capacity(budget),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Change the budget. It may not drop below the current length.
    pub fn set_budget(&mut self, budget: usize) -> Result<(), AttackError> {
        if budget < self.edges.len() {
            return Err(AttackError::InvalidBudget {
                budget,
                attacked: self.edges.len(),
            });
        }
        self.budget = budget;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Lines that can still be attacked.
    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.edges.len())
    }

    pub fn is_full(&self) -> bool {
        self.edges.len() >= self.budget
    }

    pub fn contains(&self, edge: BranchId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn as_slice(&self) -> &[BranchId] {
        &self.edges
    }

    pub fn iter(&self) -> impl Iterator<Item = BranchId> + '_ {
        self.edges.iter().copied()
    }

    pub fn last(&self) -> Option<BranchId> {
        self.edges.last().copied()
    }

    /// Check that `edge` could be appended.
    pub fn check(&self, edge: BranchId) -> Result<(), AttackError> {
        if self.contains(edge) {
            return Err(AttackError::AlreadyAttacked(edge));
        }
        if self.is_full() {
            return Err(AttackError::BudgetExceeded {
                budget: self.budget,
            });
        }
        Ok(())
    }

    /// The sequence as it would be after appending `edge`.
    pub fn with_pushed(&self, edge: BranchId) -> Vec<BranchId> {
        let mut next = Vec::with_capacity(self.edges.len() + 1);
        next.extend_from_slice(&self.edges);
        next.push(edge);
        next
    }

    pub fn push(&mut self, edge: BranchId) -> Result<(), AttackError> {
        self.check(edge)?;
        self.edges.push(edge);
        Ok(())
    }

    pub fn pop_last(&mut self) -> Option<BranchId> {
        self.edges.pop()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
