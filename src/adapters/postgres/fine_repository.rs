use crate::domain::{
    fine::{Fine, FineStatus},
    value_objects::{FineId, LoanId, MemberId, StaffId},
};
use crate::ports::fine_repository::{FineRepository as FineRepositoryTrait, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

const FINE_COLUMNS: &str = r#"
    fine_id,
    loan_id,
    member_id,
    amount,
    days_late,
    status,
    assessed_at,
    settled_at,
    waived_by
"#;

fn map_row_to_fine(row: &PgRow) -> Result<Fine> {
    let status = FineStatus::from_str(row.get("status")).map_err(invalid_data)?;
    let days_late: i32 = row.get("days_late");
    let days_late = u32::try_from(days_late)
        .map_err(|_| invalid_data(format!("days_late out of range: {}", days_late)))?;
    let waived_by: Option<uuid::Uuid> = row.get("waived_by");

    Ok(Fine {
        fine_id: FineId::from_uuid(row.get("fine_id")),
        loan_id: LoanId::from_uuid(row.get("loan_id")),
        member_id: MemberId::from_uuid(row.get("member_id")),
        amount: row.get("amount"),
        days_late,
        status,
        assessed_at: row.get("assessed_at"),
        settled_at: row.get("settled_at"),
        waived_by: waived_by.map(StaffId::from_uuid),
    })
}

/// FineRepositoryのPostgreSQL実装
///
/// loan_idの一意制約で1件の貸出につき罰金1件を保証する。
pub struct FineRepository {
    pool: PgPool,
}

impl FineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str, bind: uuid::Uuid) -> Result<Vec<Fine>> {
        let sql = format!("SELECT {FINE_COLUMNS} FROM fines WHERE {condition}");
        let rows = sqlx::query(&sql).bind(bind).fetch_all(&self.pool).await?;
        rows.iter().map(map_row_to_fine).collect()
    }
}

#[async_trait]
impl FineRepositoryTrait for FineRepository {
    async fn insert(&self, fine: &Fine) -> Result<bool> {
        let days_late = i32::try_from(fine.days_late)
            .map_err(|_| invalid_data(format!("days_late out of range: {}", fine.days_late)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO fines (
                fine_id,
                loan_id,
                member_id,
                amount,
                days_late,
                status,
                assessed_at,
                settled_at,
                waived_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (loan_id) DO NOTHING
            "#,
        )
        .bind(fine.fine_id.value())
        .bind(fine.loan_id.value())
        .bind(fine.member_id.value())
        .bind(fine.amount)
        .bind(days_late)
        .bind(fine.status.as_str())
        .bind(fine.assessed_at)
        .bind(fine.settled_at)
        .bind(fine.waived_by.map(|id| id.value()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, fine_id: FineId) -> Result<Option<Fine>> {
        Ok(self.fetch_where("fine_id = $1", fine_id.value()).await?.pop())
    }

    async fn find_by_loan(&self, loan_id: LoanId) -> Result<Option<Fine>> {
        Ok(self.fetch_where("loan_id = $1", loan_id.value()).await?.pop())
    }

    async fn find_by_member(&self, member_id: MemberId) -> Result<Vec<Fine>> {
        self.fetch_where("member_id = $1 ORDER BY assessed_at DESC", member_id.value())
            .await
    }

    async fn outstanding_total(&self, member_id: MemberId) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM fines
            WHERE member_id = $1 AND status = 'pending'
            "#,
        )
        .bind(member_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn transition(&self, from: FineStatus, updated: &Fine) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fines
            SET status = $3,
                settled_at = $4,
                waived_by = $5
            WHERE fine_id = $1 AND status = $2
            "#,
        )
        .bind(updated.fine_id.value())
        .bind(from.as_str())
        .bind(updated.status.as_str())
        .bind(updated.settled_at)
        .bind(updated.waived_by.map(|id| id.value()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
