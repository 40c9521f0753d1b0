use crate::domain::{
    loan::LoanStatus,
    value_objects::{BookId, LoanId, MemberId, ReservationId},
};
use crate::ports::loan_read_model::{LoanReadModel as LoanReadModelTrait, LoanView, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

const LOAN_VIEW_COLUMNS: &str = r#"
    loan_id,
    book_id,
    member_id,
    reservation_id,
    borrowed_at,
    due_date,
    returned_at,
    renewal_count,
    status,
    created_at,
    updated_at
"#;

/// PostgreSQLの行データをLoanViewに変換する
///
/// renewal_countのi16からu8への変換とLoanStatusの文字列からの変換で
/// 不正な値をエラーにする。
fn map_row_to_loan_view(row: &PgRow) -> Result<LoanView> {
    let renewal_count_i16: i16 = row.get("renewal_count");
    let renewal_count = u8::try_from(renewal_count_i16)
        .map_err(|_| invalid_data(format!("renewal_count out of range: {}", renewal_count_i16)))?;

    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    let reservation_id: Option<uuid::Uuid> = row.get("reservation_id");

    Ok(LoanView {
        loan_id: LoanId::from_uuid(row.get("loan_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        member_id: MemberId::from_uuid(row.get("member_id")),
        reservation_id: reservation_id.map(ReservationId::from_uuid),
        borrowed_at: row.get("borrowed_at"),
        due_date: row.get("due_date"),
        returned_at: row.get("returned_at"),
        renewal_count,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// LoanReadModelのPostgreSQL実装
///
/// CQRSパターンの読み取り側。loans_viewテーブルはイベントから導出される。
pub struct LoanReadModel {
    pool: PgPool,
}

impl LoanReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanReadModelTrait for LoanReadModel {
    /// 貸出ビューを保存（upsert）
    ///
    /// INSERT ... ON CONFLICT UPDATEで冪等に集約の完全な状態を書き込む。
    async fn save(&self, loan_view: LoanView) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans_view (
                loan_id,
                book_id,
                member_id,
                reservation_id,
                borrowed_at,
                due_date,
                returned_at,
                renewal_count,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (loan_id)
            DO UPDATE SET
                due_date = EXCLUDED.due_date,
                returned_at = EXCLUDED.returned_at,
                renewal_count = EXCLUDED.renewal_count,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(loan_view.loan_id.value())
        .bind(loan_view.book_id.value())
        .bind(loan_view.member_id.value())
        .bind(loan_view.reservation_id.map(|id| id.value()))
        .bind(loan_view.borrowed_at)
        .bind(loan_view.due_date)
        .bind(loan_view.returned_at)
        .bind(i16::from(loan_view.renewal_count))
        .bind(loan_view.status.as_str())
        .bind(loan_view.created_at)
        .bind(loan_view.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 会員単位のアドバイザリロックの下で未返却件数を数え、上限未満なら登録する
    ///
    /// 同じ会員の貸出が並行しても、件数の確認と登録の間に割り込まれない。
    async fn claim_loan_slot(&self, loan_view: LoanView, max_open_loans: u32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('loans_view'), hashtext($1::text))")
            .bind(loan_view.member_id.value())
            .execute(&mut *tx)
            .await?;

        let open: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loans_view
            WHERE member_id = $1 AND status IN ('active', 'overdue')
            "#,
        )
        .bind(loan_view.member_id.value())
        .fetch_one(&mut *tx)
        .await?;

        if open >= i64::from(max_open_loans) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO loans_view (
                loan_id,
                book_id,
                member_id,
                reservation_id,
                borrowed_at,
                due_date,
                returned_at,
                renewal_count,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(loan_view.loan_id.value())
        .bind(loan_view.book_id.value())
        .bind(loan_view.member_id.value())
        .bind(loan_view.reservation_id.map(|id| id.value()))
        .bind(loan_view.borrowed_at)
        .bind(loan_view.due_date)
        .bind(loan_view.returned_at)
        .bind(i16::from(loan_view.renewal_count))
        .bind(loan_view.status.as_str())
        .bind(loan_view.created_at)
        .bind(loan_view.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn discard(&self, loan_id: LoanId) -> Result<()> {
        sqlx::query("DELETE FROM loans_view WHERE loan_id = $1")
            .bind(loan_id.value())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 会員の未返却の貸出（active, overdue）
    async fn get_open_loans_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        let sql = format!(
            "SELECT {LOAN_VIEW_COLUMNS} FROM loans_view \
             WHERE member_id = $1 AND status IN ('active', 'overdue') \
             ORDER BY borrowed_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(member_id.value())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }

    /// 延滞候補（activeかつ期限切れ）を期限の古い順に返す
    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>> {
        let sql = format!(
            "SELECT {LOAN_VIEW_COLUMNS} FROM loans_view \
             WHERE status = 'active' AND due_date < $1 \
             ORDER BY due_date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff_date)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        let sql = format!("SELECT {LOAN_VIEW_COLUMNS} FROM loans_view WHERE loan_id = $1");
        let row = sqlx::query(&sql)
            .bind(loan_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan_view).transpose()
    }

    /// 会員の全貸出（貸出履歴）
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        let sql = format!(
            "SELECT {LOAN_VIEW_COLUMNS} FROM loans_view \
             WHERE member_id = $1 \
             ORDER BY borrowed_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(member_id.value())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }
}
