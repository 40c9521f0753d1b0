use crate::domain::value_objects::BookId;
use crate::ports::book_service::{BookAvailability, BookService as BookServiceTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

#[derive(Debug, Clone)]
struct BookRecord {
    title: String,
    total_copies: u32,
    available_copies: u32,
}

/// BookServiceのモック実装
///
/// 書籍と在庫数をメモリに保持する。在庫の判定と減算は1回のロック内で行う。
#[derive(Default)]
pub struct BookService {
    books: Mutex<HashMap<BookId, BookRecord>>,
}

impl BookService {
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト用に書籍を登録（全冊が棚にある状態）
    pub fn add_book(&self, book_id: BookId, title: impl Into<String>, copies: u32) {
        lock(&self.books).insert(
            book_id,
            BookRecord {
                title: title.into(),
                total_copies: copies,
                available_copies: copies,
            },
        );
    }
}

#[async_trait]
impl BookServiceTrait for BookService {
    async fn availability(&self, book_id: BookId) -> Result<Option<BookAvailability>> {
        Ok(lock(&self.books).get(&book_id).map(|book| BookAvailability {
            total_copies: book.total_copies,
            available_copies: book.available_copies,
        }))
    }

    async fn try_checkout_copy(&self, book_id: BookId) -> Result<bool> {
        let mut books = lock(&self.books);
        match books.get_mut(&book_id) {
            Some(book) if book.available_copies > 0 => {
                book.available_copies -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_copies(&self, book_id: BookId, count: u32) -> Result<()> {
        if let Some(book) = lock(&self.books).get_mut(&book_id) {
            book.available_copies = book
                .available_copies
                .saturating_add(count)
                .min(book.total_copies);
        }
        Ok(())
    }

    async fn add_copies(&self, book_id: BookId, count: u32) -> Result<()> {
        if let Some(book) = lock(&self.books).get_mut(&book_id) {
            book.total_copies = book.total_copies.saturating_add(count);
        }
        Ok(())
    }

    async fn get_book_title(&self, book_id: BookId) -> Result<String> {
        lock(&self.books)
            .get(&book_id)
            .map(|book| book.title.clone())
            .ok_or_else(|| format!("Book {} not found", book_id).into())
    }
}
