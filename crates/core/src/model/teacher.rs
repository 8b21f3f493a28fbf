use crate::accounts::UserAccount;

/// A course author.
#[derive(Debug, Clone)]
pub struct Teacher {
    pub account: UserAccount,
}

impl Teacher {
    pub fn new(account: UserAccount) -> Self {
        Self { account }
    }

    pub fn code(&self) -> &str {
        &self.account.code
    }

    pub fn name(&self) -> &str {
        &self.account.name
    }
}
