//! Account directory backed by a single configured record

use crate::config::AccountFixture;
use crate::runtime::traits::AccountDirectory;
use crate::services::ServiceError;
use crate::state_machine::AccountRecord;
use async_trait::async_trait;

/// Stand-in for a customer database: one known account
#[derive(Debug, Clone)]
pub struct StaticAccountDirectory {
    record: AccountRecord,
}

impl StaticAccountDirectory {
    pub fn new(record: AccountRecord) -> Self {
        Self { record }
    }

    pub fn from_fixture(fixture: &AccountFixture) -> Self {
        Self::new(AccountRecord {
            last_four: fixture.last_four.clone(),
            outstanding_amount: fixture.outstanding_amount.clone(),
            due_date: fixture.due_date.clone(),
            installment_amount: fixture.installment_amount.clone(),
        })
    }
}

#[async_trait]
impl AccountDirectory for StaticAccountDirectory {
    async fn lookup(&self, last_four: &str) -> Result<Option<AccountRecord>, ServiceError> {
        Ok((self.record.last_four == last_four).then(|| self.record.clone()))
    }
}
