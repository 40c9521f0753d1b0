use crate::domain::{
    loan::LoanStatus,
    value_objects::{LoanId, MemberId},
};
use crate::ports::loan_read_model::{LoanReadModel as LoanReadModelTrait, LoanView, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

/// LoanReadModelのインメモリ実装
#[derive(Default)]
pub struct LoanReadModel {
    loans: Mutex<HashMap<LoanId, LoanView>>,
}

impl LoanReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, predicate: impl Fn(&LoanView) -> bool) -> Vec<LoanView> {
        let mut loans: Vec<LoanView> = lock(&self.loans)
            .values()
            .filter(|loan| predicate(loan))
            .cloned()
            .collect();
        loans.sort_by_key(|loan| Reverse(loan.borrowed_at));
        loans
    }
}

#[async_trait]
impl LoanReadModelTrait for LoanReadModel {
    async fn save(&self, loan_view: LoanView) -> Result<()> {
        lock(&self.loans).insert(loan_view.loan_id, loan_view);
        Ok(())
    }

    async fn claim_loan_slot(&self, loan_view: LoanView, max_open_loans: u32) -> Result<bool> {
        let mut loans = lock(&self.loans);
        let open = loans
            .values()
            .filter(|loan| loan.member_id == loan_view.member_id && loan.status.is_open())
            .count();
        if open >= max_open_loans as usize {
            return Ok(false);
        }
        loans.insert(loan_view.loan_id, loan_view);
        Ok(true)
    }

    async fn discard(&self, loan_id: LoanId) -> Result<()> {
        lock(&self.loans).remove(&loan_id);
        Ok(())
    }

    async fn get_open_loans_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        Ok(self.select(|loan| loan.member_id == member_id && loan.status.is_open()))
    }

    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>> {
        let mut loans =
            self.select(|loan| loan.status == LoanStatus::Active && loan.due_date < cutoff_date);
        loans.sort_by_key(|loan| loan.due_date);
        Ok(loans)
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        Ok(lock(&self.loans).get(&loan_id).cloned())
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        Ok(self.select(|loan| loan.member_id == member_id))
    }
}
