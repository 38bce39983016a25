//! Who may use the bot.

use std::collections::HashSet;

/// Authorization predicate consulted before any event is handled
pub trait AccessPolicy: Send + Sync {
    /// Returns `true` if `user_id` may use the bot
    fn is_allowed(&self, user_id: i64) -> bool;
}

/// Lets everybody in
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn is_allowed(&self, _user_id: i64) -> bool {
        true
    }
}

/// Lets in only the listed user ids
#[derive(Debug, Default, Clone)]
pub struct AllowList {
    users: HashSet<i64>,
}

impl AllowList {
    /// Create an allow list
    #[must_use]
    pub const fn new(users: HashSet<i64>) -> Self {
        Self { users }
    }
}

impl AccessPolicy for AllowList {
    fn is_allowed(&self, user_id: i64) -> bool {
        self.users.contains(&user_id)
    }
}
