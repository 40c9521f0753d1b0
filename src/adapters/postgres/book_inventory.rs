use crate::domain::value_objects::BookId;
use crate::ports::book_service::{BookAvailability, BookService, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::invalid_data;

/// BookServiceのPostgreSQL実装
///
/// booksテーブルの在庫数を条件付きUPDATEで増減する。
pub struct BookInventory {
    pool: PgPool,
}

impl BookInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_count(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_data(format!("negative copy count: {}", value)))
}

fn to_i32(count: u32) -> Result<i32> {
    i32::try_from(count).map_err(|_| invalid_data(format!("copy count too large: {}", count)))
}

#[async_trait]
impl BookService for BookInventory {
    async fn availability(&self, book_id: BookId) -> Result<Option<BookAvailability>> {
        let row = sqlx::query(
            r#"
            SELECT total_copies, available_copies
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(BookAvailability {
                total_copies: to_count(row.get("total_copies"))?,
                available_copies: to_count(row.get("available_copies"))?,
            })
        })
        .transpose()
    }

    /// 在庫が残っている場合のみ1冊減らす
    ///
    /// 判定と減算は1文のUPDATEで行うため、同時実行でも在庫は負にならない。
    async fn try_checkout_copy(&self, book_id: BookId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE book_id = $1 AND available_copies > 0
            "#,
        )
        .bind(book_id.value())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_copies(&self, book_id: BookId, count: u32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET available_copies = LEAST(available_copies + $2, total_copies)
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .bind(to_i32(count)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_copies(&self, book_id: BookId, count: u32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET total_copies = total_copies + $2
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .bind(to_i32(count)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_book_title(&self, book_id: BookId) -> Result<String> {
        let title: Option<String> =
            sqlx::query_scalar("SELECT title FROM books WHERE book_id = $1")
                .bind(book_id.value())
                .fetch_optional(&self.pool)
                .await?;

        title.ok_or_else(|| invalid_data(format!("book {} not found", book_id)))
    }
}
