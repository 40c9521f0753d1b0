use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UUIDをラップした識別子型を定義する
///
/// 各コンテキストのIDを別の型にすることで、
/// 会員IDと書籍IDの取り違えをコンパイル時に防ぐ。
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// 貸出ID - 貸出集約のID（イベントストアの集約ID）
    LoanId
);
uuid_id!(
    /// 書籍ID - カタログコンテキストへの参照
    BookId
);
uuid_id!(
    /// 会員ID - 会員管理コンテキストへの参照
    MemberId
);
uuid_id!(
    /// 職員ID - 罰金の免除など管理操作の実行者
    StaffId
);
uuid_id!(
    /// 予約ID
    ReservationId
);
uuid_id!(
    /// 罰金ID
    FineId
);

/// 延長回数の上限
pub const MAX_RENEWALS: u8 = 2;

/// 延長回数エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalCountError {
    /// 延長回数の上限を超えた
    LimitExceeded,
}

/// 延長回数
///
/// 不変条件：延長は2回まで。
/// 上限を超える値は作成できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalCount(u8);

impl RenewalCount {
    /// 新規作成（0回）
    pub fn new() -> Self {
        Self(0)
    }

    /// 延長回数を増やす
    ///
    /// # エラー
    /// 既に上限まで延長済みの場合は`RenewalCountError::LimitExceeded`を返す
    pub fn increment(self) -> Result<Self, RenewalCountError> {
        if !self.can_renew() {
            return Err(RenewalCountError::LimitExceeded);
        }
        Ok(Self(self.0 + 1))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// まだ延長できるか
    pub fn can_renew(&self) -> bool {
        self.0 < MAX_RENEWALS
    }
}

impl Default for RenewalCount {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<u8> for RenewalCount {
    type Error = RenewalCountError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > MAX_RENEWALS {
            return Err(RenewalCountError::LimitExceeded);
        }
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renewal_count_starts_at_zero() {
        let count = RenewalCount::new();
        assert_eq!(count.value(), 0);
        assert!(count.can_renew());
    }

    #[test]
    fn test_renewal_count_allows_two_renewals() {
        let count = RenewalCount::new().increment().unwrap();
        assert!(count.can_renew());

        let count = count.increment().unwrap();
        assert_eq!(count.value(), 2);
        assert!(!count.can_renew());
    }

    #[test]
    fn test_renewal_count_third_increment_fails() {
        let count = RenewalCount::try_from(2).unwrap();
        assert_eq!(count.increment(), Err(RenewalCountError::LimitExceeded));
    }

    #[test]
    fn test_renewal_count_try_from_rejects_out_of_range() {
        assert!(RenewalCount::try_from(0).is_ok());
        assert!(RenewalCount::try_from(2).is_ok());
        assert_eq!(
            RenewalCount::try_from(3),
            Err(RenewalCountError::LimitExceeded)
        );
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(LoanId::new(), LoanId::new());
        assert_ne!(ReservationId::new(), ReservationId::new());
        assert_ne!(FineId::new(), FineId::new());
    }

    #[test]
    fn test_id_from_uuid_round_trip() {
        let uuid = Uuid::new_v4();
        assert_eq!(MemberId::from_uuid(uuid).value(), uuid);
        assert_eq!(BookId::from_uuid(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&LoanId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
