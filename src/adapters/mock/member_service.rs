use crate::domain::{subscription::Subscription, value_objects::MemberId};
use crate::ports::member_service::{MemberService as MemberServiceTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::lock;

/// Mock implementation of MemberService
///
/// Stores each registered member's subscription in memory.
#[derive(Default)]
pub struct MemberService {
    members: Mutex<HashMap<MemberId, Subscription>>,
}

impl MemberService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member, or change an existing member's subscription
    pub fn add_member(&self, member_id: MemberId, subscription: Subscription) {
        lock(&self.members).insert(member_id, subscription);
    }
}

#[async_trait]
impl MemberServiceTrait for MemberService {
    async fn find_subscription(&self, member_id: MemberId) -> Result<Option<Subscription>> {
        Ok(lock(&self.members).get(&member_id).copied())
    }
}
