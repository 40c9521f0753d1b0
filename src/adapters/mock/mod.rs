pub mod book_service;
pub mod member_service;
pub mod notification_service;

pub use book_service::BookService;
pub use member_service::MemberService;
pub use notification_service::{NotificationService, SentNotification};
