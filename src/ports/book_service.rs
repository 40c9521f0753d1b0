use crate::domain::value_objects::BookId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 書籍の在庫数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookAvailability {
    pub total_copies: u32,
    /// 棚にあり、すぐ貸出できる冊数
    pub available_copies: u32,
}

/// 書籍在庫ポート
///
/// カタログコンテキストとの境界。貸出コンテキストはBookIDと在庫数だけを扱う。
#[async_trait]
pub trait BookService: Send + Sync {
    /// 在庫数を取得する。書籍が存在しない場合は`None`
    async fn availability(&self, book_id: BookId) -> Result<Option<BookAvailability>>;

    /// 棚から1冊取り出す
    ///
    /// 在庫数が1以上の場合のみ減算し`true`を返す。判定と減算は不可分。
    /// 最後の1冊を同時に借りようとした場合、`true`になるのは1件だけ。
    async fn try_checkout_copy(&self, book_id: BookId) -> Result<bool>;

    /// 棚に戻す（総冊数を超えない）
    async fn release_copies(&self, book_id: BookId, count: u32) -> Result<()>;

    /// 蔵書を追加する
    ///
    /// 総冊数だけを増やす。追加分は呼び出し側が予約待ち行列に渡すか棚に戻す。
    async fn add_copies(&self, book_id: BookId, count: u32) -> Result<()>;

    /// 通知メッセージ用の書籍タイトル
    async fn get_book_title(&self, book_id: BookId) -> Result<String>;
}
