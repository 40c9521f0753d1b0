use crate::domain::{
    fine::{Fine, FineStatus, outstanding_total},
    value_objects::{FineId, LoanId, MemberId},
};
use crate::ports::fine_repository::{FineRepository as FineRepositoryTrait, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

/// FineRepositoryのインメモリ実装
#[derive(Default)]
pub struct FineRepository {
    fines: Mutex<HashMap<FineId, Fine>>,
}

impl FineRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FineRepositoryTrait for FineRepository {
    async fn insert(&self, fine: &Fine) -> Result<bool> {
        let mut fines = lock(&self.fines);
        if fines.values().any(|f| f.loan_id == fine.loan_id) {
            return Ok(false);
        }
        fines.insert(fine.fine_id, fine.clone());
        Ok(true)
    }

    async fn get_by_id(&self, fine_id: FineId) -> Result<Option<Fine>> {
        Ok(lock(&self.fines).get(&fine_id).cloned())
    }

    async fn find_by_loan(&self, loan_id: LoanId) -> Result<Option<Fine>> {
        Ok(lock(&self.fines)
            .values()
            .find(|f| f.loan_id == loan_id)
            .cloned())
    }

    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Fine>> {
        let mut fines: Vec<Fine> = lock(&self.fines)
            .values()
            .filter(|f| f.member_id == member_id)
            .cloned()
            .collect();
        fines.sort_by_key(|f| Reverse(f.assessed_at));
        Ok(fines)
    }

    async fn outstanding_total(&self, member_id: MemberId) -> Result<Decimal> {
        let fines = lock(&self.fines);
        Ok(outstanding_total(
            fines.values().filter(|f| f.member_id == member_id),
        ))
    }

    async fn transition(&self, from: FineStatus, updated: &Fine) -> Result<bool> {
        let mut fines = lock(&self.fines);
        match fines.get_mut(&updated.fine_id) {
            Some(current) if current.status == from => {
                *current = updated.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
