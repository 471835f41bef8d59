//! In-memory collaborators for unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use idbridge_core::SelectionRow;
use parking_lot::Mutex;

use crate::traits::{
    AccountDetail, AccountSelection, FieldCatalog, FieldDescriptor, RemoteFunctions,
};
use crate::update::ChangeRequest;

/// A remote call as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListAll,
    ListPattern(String),
    ListRows(Vec<SelectionRow>),
    Get(String),
    Read { table: String, options: Vec<String> },
}

/// Remote system backed by fixed data. Selection rows are recorded but not
/// evaluated: a row-filtered list returns every account.
#[derive(Default)]
pub(crate) struct FakeRemote {
    accounts: Vec<(String, AccountDetail)>,
    records: HashMap<String, Vec<String>>,
    fail: bool,
    calls: Mutex<Vec<Call>>,
    submitted: Mutex<Vec<ChangeRequest>>,
}

impl FakeRemote {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_account(mut self, id: &str, detail: AccountDetail) -> Self {
        self.accounts.push((id.to_string(), detail));
        self
    }

    pub(crate) fn with_records(mut self, table: &str, records: &[&str]) -> Self {
        self.records.insert(
            table.to_string(),
            records.iter().map(|r| (*r).to_string()).collect(),
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn submitted(&self) -> Vec<ChangeRequest> {
        self.submitted.lock().clone()
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFunctions for FakeRemote {
    async fn list_accounts(&self, selection: AccountSelection<'_>) -> anyhow::Result<Vec<String>> {
        self.check()?;
        let ids = self.accounts.iter().map(|(id, _)| id.clone());
        let (call, ids): (Call, Vec<String>) = match selection {
            AccountSelection::All => (Call::ListAll, ids.collect()),
            AccountSelection::IdPattern(pattern) => {
                let needle = pattern.trim_matches('*').to_string();
                (
                    Call::ListPattern(pattern.to_string()),
                    ids.filter(|id| id.contains(&needle)).collect(),
                )
            }
            AccountSelection::Rows(rows) => (Call::ListRows(rows.to_vec()), ids.collect()),
        };
        self.calls.lock().push(call);
        Ok(ids)
    }

    async fn get_account(&self, id: &str) -> anyhow::Result<Option<AccountDetail>> {
        self.check()?;
        self.calls.lock().push(Call::Get(id.to_string()));
        Ok(self
            .accounts
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, detail)| detail.clone()))
    }

    async fn read_table(
        &self,
        table: &str,
        options: &[String],
        _fields: &[&str],
    ) -> anyhow::Result<Vec<String>> {
        self.check()?;
        self.calls.lock().push(Call::Read {
            table: table.to_string(),
            options: options.to_vec(),
        });
        Ok(self.records.get(table).cloned().unwrap_or_default())
    }

    async fn submit(&self, request: &ChangeRequest) -> anyhow::Result<()> {
        self.check()?;
        self.submitted.lock().push(request.clone());
        Ok(())
    }
}

/// Field catalog answering from a fixed list of `(structure, field, wire type)`.
#[derive(Default)]
pub(crate) struct FakeFields {
    fields: Vec<(String, FieldDescriptor)>,
}

impl FakeFields {
    pub(crate) fn with(mut self, structure: &str, field: &str, wire_type: &str) -> Self {
        self.fields.push((
            structure.to_string(),
            FieldDescriptor {
                name: field.to_string(),
                wire_type: wire_type.to_string(),
                length: 0,
            },
        ));
        self
    }
}

impl FieldCatalog for FakeFields {
    fn fields(&self, structure: &str) -> Vec<FieldDescriptor> {
        self.fields
            .iter()
            .filter(|(s, _)| s == structure)
            .map(|(_, f)| f.clone())
            .collect()
    }
}
