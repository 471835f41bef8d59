//! Query planning and execution.
//!
//! A predicate is first offered to the [`FilterTranslator`]. A native model
//! is pushed to the remote call; anything else becomes
//! [`FilterModel::Opaque`] and the executor fetches broadly, then keeps the
//! decoded entities the predicate matches.

use std::collections::HashMap;
use std::sync::Arc;

use idbridge_core::schema::KEY_SEPARATOR;
use idbridge_core::{
    Entity, EntityKind, FilterModel, FilterTranslator, NativeAllowList, Predicate, Table,
    TableSchema, Value, ValueKind,
};
use tracing::{debug, info};

use crate::catalog::SchemaCatalog;
use crate::config::{ConnectorConfig, TableAttributeConfig};
use crate::error::ConnectorError;
use crate::traits::{AccountDetail, AccountSelection, FieldCatalog, RemoteFunctions};

/// Runs searches against the remote system.
pub struct SearchExecutor {
    remote: Arc<dyn RemoteFunctions>,
    catalog: SchemaCatalog,
    translator: FilterTranslator,
    allow_list: NativeAllowList,
    account_tables: Vec<TableAttributeConfig>,
    /// Value kind of every structure field, keyed `PARAM.FIELD`.
    scalar_kinds: HashMap<String, ValueKind>,
}

impl SearchExecutor {
    /// Builds the executor, parsing every table definition and resolving
    /// field kinds once.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if a table definition is invalid.
    pub fn new(
        config: &ConnectorConfig,
        remote: Arc<dyn RemoteFunctions>,
        fields: &dyn FieldCatalog,
    ) -> Result<Self, ConnectorError> {
        let catalog = SchemaCatalog::from_config(config)?.with_field_kinds(fields);
        let scalar_kinds = config
            .structures
            .iter()
            .flat_map(|structure| {
                fields
                    .fields(structure)
                    .into_iter()
                    .map(move |f| (format!("{structure}.{}", f.name), f.kind()))
            })
            .collect();

        Ok(Self {
            remote,
            catalog,
            translator: config.translator(),
            allow_list: config.allow_list(),
            account_tables: config.account_tables.clone(),
            scalar_kinds,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Native model for `predicate`, or [`FilterModel::Opaque`] when the
    /// remote side cannot evaluate it.
    #[must_use]
    pub fn plan(&self, predicate: &Predicate, kind: EntityKind) -> FilterModel {
        if let Some(model) = self.translator.translate(predicate, kind, &self.allow_list) {
            debug!(?kind, "native filter plan");
            model
        } else {
            debug!(?kind, "in-memory filter plan");
            FilterModel::Opaque(predicate.clone())
        }
    }

    /// Searches accounts. `None` returns every account.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Remote`] on a failed call and
    /// [`ConnectorError::Data`] if a returned value does not decode.
    pub async fn search_accounts(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Entity>, ConnectorError> {
        let plan = predicate.map(|p| self.plan(p, EntityKind::Account));
        let ids = match &plan {
            Some(FilterModel::KeyEquals(id)) => vec![id.clone()],
            Some(FilterModel::KeyContains(pattern)) => {
                self.remote
                    .list_accounts(AccountSelection::IdPattern(pattern))
                    .await?
            }
            Some(model @ (FilterModel::Leaf(_) | FilterModel::Group(_))) => {
                let rows = model.selection_rows();
                self.remote.list_accounts(AccountSelection::Rows(&rows)).await?
            }
            None | Some(FilterModel::Opaque(_)) => {
                self.remote.list_accounts(AccountSelection::All).await?
            }
        };

        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(detail) = self.remote.get_account(&id).await? else {
                debug!(account = %id, "account not found");
                continue;
            };
            let entity = self.decode_account(&id, &detail)?;
            if let Some(FilterModel::Opaque(predicate)) = &plan {
                if !predicate.matches(&entity, self.translator.identity_attribute()) {
                    continue;
                }
            }
            entities.push(entity);
        }

        info!(found = entities.len(), "account search finished");
        Ok(entities)
    }

    /// Searches the records of a configured table, by name or alias.
    ///
    /// Identity equality and constant columns are pushed down as read
    /// options; sub-table values are attached under the sub-table's alias.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnknownTable`] for an unconfigured table,
    /// [`ConnectorError::Remote`] on a failed call and
    /// [`ConnectorError::Data`] if a record does not decode.
    pub async fn search_table(
        &self,
        name: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Entity>, ConnectorError> {
        let schema = self
            .catalog
            .table(name)
            .ok_or_else(|| ConnectorError::UnknownTable {
                name: name.to_string(),
            })?;
        let plan = predicate.map(|p| self.plan(p, EntityKind::Table));
        let key = match &plan {
            Some(FilterModel::KeyEquals(id)) => Some(id.as_str()),
            _ => None,
        };

        let mut entities = Vec::new();
        for record in self.read(schema, key).await? {
            if let Some(entity) = schema.decode(&record)? {
                if key.is_some_and(|key| entity.id != key) {
                    continue;
                }
                entities.push(entity);
            }
        }

        for sub in self.catalog.sub_tables_of(&schema.name) {
            let mut values: HashMap<String, Vec<Value>> = HashMap::new();
            for record in self.read(&sub.table, key).await? {
                if let Some(row) = sub.decode(&record)? {
                    if key.is_some_and(|key| row.parent_id != key) {
                        continue;
                    }
                    values
                        .entry(row.parent_id)
                        .or_default()
                        .push(Value::Text(row.value));
                }
            }
            for entity in &mut entities {
                let attached = values.remove(&entity.id).unwrap_or_default();
                entity.attributes.push((sub.table.alias.clone(), attached));
            }
        }

        if let Some(FilterModel::Opaque(predicate)) = &plan {
            let identity = self.translator.identity_attribute();
            entities.retain(|e| predicate.matches(e, identity));
        }

        info!(table = %schema.name, found = entities.len(), "table search finished");
        Ok(entities)
    }

    async fn read(
        &self,
        schema: &TableSchema,
        key: Option<&str>,
    ) -> Result<Vec<String>, ConnectorError> {
        let options = read_options(schema, key);
        debug!(table = %schema.name, options = options.len(), "reading table");
        Ok(self
            .remote
            .read_table(&schema.name, &options, &schema.field_names())
            .await?)
    }

    fn decode_account(&self, id: &str, detail: &AccountDetail) -> Result<Entity, ConnectorError> {
        let mut attributes = vec![(
            self.translator.identity_attribute().to_string(),
            vec![Value::text(id)],
        )];

        for (name, raw) in &detail.scalars {
            let kind = self.scalar_kinds.get(name).copied().unwrap_or_default();
            let values = match kind.decode(raw)? {
                Value::Null => Vec::new(),
                Value::Text(t) if t.is_empty() => Vec::new(),
                value => vec![value],
            };
            attributes.push((name.clone(), values));
        }

        for config in &self.account_tables {
            let table = Table::from_wire(detail.table(&config.parameter).iter().cloned());
            let texts = |items: Vec<String>| items.into_iter().map(Value::Text).collect::<Vec<_>>();
            attributes.push((config.parameter.clone(), texts(table.serialized_rows())));
            let keys = texts(table.column_values(&config.key_field));
            attributes.push((config.key_attribute(), keys));
            if let Some(compact) = config.compact_attribute() {
                let values = table.compact_values(
                    &config.key_field,
                    config.valid_from_field.as_deref().unwrap_or_default(),
                    config.valid_to_field.as_deref().unwrap_or_default(),
                )?;
                attributes.push((compact, texts(values)));
            }
        }

        Ok(Entity::new(id, attributes))
    }
}

/// `FIELD = 'VALUE'` clauses: constant columns first, then the key columns
/// when the identifier is known.
///
/// Blank key parts are dropped from identifiers and key values may contain
/// the separator, so the key is pushed down only when it splits into exactly
/// one non-empty part per key column. Callers re-check the identifier.
fn read_options(schema: &TableSchema, key: Option<&str>) -> Vec<String> {
    let clause = |field: &str, value: &str| format!("{field} = '{}'", value.replace('\'', "''"));
    let mut options: Vec<String> = schema
        .filter_constants()
        .into_iter()
        .map(|(field, value)| clause(field, value))
        .collect();
    if let Some(parts) = key.and_then(|key| key_parts(schema, key)) {
        options.extend(
            schema
                .key_names
                .iter()
                .zip(parts)
                .map(|(field, value)| clause(field, value)),
        );
    }
    options
}

fn key_parts<'a>(schema: &TableSchema, key: &'a str) -> Option<Vec<&'a str>> {
    let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    (parts.len() == schema.key_names.len() && parts.iter().all(|p| !p.is_empty()))
        .then_some(parts)
}

#[cfg(test)]
mod tests {
    use idbridge_core::{CompareOp, SelectionRow};

    use super::*;
    use crate::testing::{Call, FakeFields, FakeRemote};

    fn detail(id: &str, last_name: &str, roles: &[(&str, &str, &str)]) -> AccountDetail {
        AccountDetail {
            scalars: vec![
                ("ADDRESS.LASTNAME".to_string(), last_name.to_string()),
                ("LOGONDATA.GLTGB".to_string(), "20301231".to_string()),
                ("ADDRESS.CITY".to_string(), format!("{id}-city")),
            ],
            tables: vec![(
                "ACTIVITYGROUPS".to_string(),
                roles
                    .iter()
                    .map(|(name, from, to)| {
                        vec![
                            ("AGR_NAME".to_string(), (*name).to_string()),
                            ("FROM_DAT".to_string(), (*from).to_string()),
                            ("TO_DAT".to_string(), (*to).to_string()),
                        ]
                    })
                    .collect(),
            )],
        }
    }

    fn remote() -> FakeRemote {
        FakeRemote::default()
            .with_account(
                "JDOE",
                detail("JDOE", "Doe", &[("Z_ROLE_A", "2024-01-01", "9999-12-31")]),
            )
            .with_account("MMUSTER", detail("MMUSTER", "Muster", &[]))
    }

    fn fields() -> FakeFields {
        FakeFields::default()
            .with("ADDRESS", "LASTNAME", "C")
            .with("LOGONDATA", "GLTGB", "D")
    }

    fn executor(remote: Arc<FakeRemote>, config: &ConnectorConfig) -> SearchExecutor {
        SearchExecutor::new(config, remote, &fields()).unwrap()
    }

    // ---- planning ----

    #[test]
    fn plan_falls_back_to_opaque() {
        let exec = executor(Arc::new(FakeRemote::default()), &ConnectorConfig::default());
        let native = Predicate::equals("ADDRESS.LASTNAME", "Doe");
        assert!(exec.plan(&native, EntityKind::Account).is_native());

        let foreign = Predicate::equals("ADDRESS.CITY", "Berlin");
        assert_eq!(
            exec.plan(&foreign, EntityKind::Account),
            FilterModel::Opaque(foreign.clone())
        );
    }

    // ---- account search ----

    #[tokio::test]
    async fn identity_equality_fetches_one_account() {
        let remote = Arc::new(remote());
        let exec = executor(remote.clone(), &ConnectorConfig::default());
        let found = exec
            .search_accounts(Some(&Predicate::equals("USERNAME", "JDOE")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(remote.calls(), vec![Call::Get("JDOE".to_string())]);
    }

    #[tokio::test]
    async fn missing_account_yields_empty_result() {
        let exec = executor(Arc::new(remote()), &ConnectorConfig::default());
        let found = exec
            .search_accounts(Some(&Predicate::equals("USERNAME", "NOBODY")))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn identity_contains_uses_id_pattern() {
        let remote = Arc::new(remote());
        let exec = executor(remote.clone(), &ConnectorConfig::default());
        let found = exec
            .search_accounts(Some(&Predicate::contains("USERNAME", "DOE")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(remote.calls()[0], Call::ListPattern("*DOE*".to_string()));
    }

    #[tokio::test]
    async fn native_filter_is_sent_as_selection_rows() {
        let remote = Arc::new(remote());
        let exec = executor(remote.clone(), &ConnectorConfig::default());
        exec.search_accounts(Some(&Predicate::equals("ADDRESS.LASTNAME", "Doe")))
            .await
            .unwrap();
        assert_eq!(
            remote.calls()[0],
            Call::ListRows(vec![SelectionRow::Condition {
                parameter: "ADDRESS".to_string(),
                field: Some("LASTNAME".to_string()),
                sign: "I",
                option: "EQ",
                low: "Doe".to_string(),
            }])
        );
    }

    #[tokio::test]
    async fn opaque_filter_is_evaluated_in_memory() {
        let remote = Arc::new(remote());
        let exec = executor(remote.clone(), &ConnectorConfig::default());
        let found = exec
            .search_accounts(Some(&Predicate::contains("ADDRESS.CITY", "MUSTER")))
            .await
            .unwrap();
        assert_eq!(remote.calls()[0], Call::ListAll);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "MMUSTER");
    }

    #[tokio::test]
    async fn account_values_are_typed_and_tables_projected() {
        let exec = executor(Arc::new(remote()), &ConnectorConfig::default());
        let found = exec
            .search_accounts(Some(&Predicate::equals("USERNAME", "JDOE")))
            .await
            .unwrap();
        let jdoe = &found[0];

        assert_eq!(jdoe.get("USERNAME"), Some(&[Value::text("JDOE")][..]));
        assert_eq!(
            jdoe.get("LOGONDATA.GLTGB"),
            Some(&[Value::Date(chrono::NaiveDate::from_ymd_opt(2030, 12, 31).unwrap())][..])
        );
        assert_eq!(
            jdoe.get("ACTIVITYGROUPS.AGR_NAME"),
            Some(&[Value::text("Z_ROLE_A")][..])
        );
        assert_eq!(
            jdoe.get("ACTIVITYGROUPS.COMPACT"),
            Some(&[Value::text("Z_ROLE_A|2024-01-01|9999-12-31")][..])
        );
        let rows = jdoe.get("ACTIVITYGROUPS").unwrap();
        assert!(matches!(
            &rows[0],
            Value::Text(xml) if xml.contains("<AGR_NAME>Z_ROLE_A</AGR_NAME>")
        ));
        assert_eq!(jdoe.get("PROFILES.BAPIPROF"), Some(&[][..]));
    }

    #[tokio::test]
    async fn date_range_filter_on_typed_scalar() {
        let exec = executor(Arc::new(remote()), &ConnectorConfig::default());
        let cutoff = Value::Date(chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        let predicate = Predicate::compare("LOGONDATA.GLTGB", CompareOp::GreaterThan, cutoff)
            .negate();
        // Negated ranges have no native form; both accounts expire after the cutoff.
        let found = exec.search_accounts(Some(&predicate)).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn remote_failure_is_reported() {
        let exec = executor(Arc::new(FakeRemote::failing()), &ConnectorConfig::default());
        assert!(matches!(
            exec.search_accounts(None).await,
            Err(ConnectorError::Remote(_))
        ));
    }

    // ---- table search ----

    fn table_config() -> ConnectorConfig {
        ConnectorConfig {
            tables: vec!["AGR_DEFINE as roles = MANDT:3:IGNORE,AGR_NAME:30:KEY,PARENT_AGR:30".to_string()],
            sub_tables: vec![
                "AGR_TEXTS for AGR_DEFINE as texts = MANDT:3:IGNORE,AGR_NAME:30:KEY,SPRAS:1(\"E\"),TEXT:40"
                    .to_string(),
            ],
            ..ConnectorConfig::default()
        }
    }

    fn pad(parts: &[(&str, usize)]) -> String {
        parts.iter().map(|(s, w)| format!("{s:<w$}")).collect()
    }

    fn table_remote() -> FakeRemote {
        FakeRemote::default()
            .with_records(
                "AGR_DEFINE",
                &[
                    &pad(&[("100", 3), ("Z_ROLE_A", 30), ("Z_PARENT", 30)]),
                    &pad(&[("100", 3), ("Z_ROLE_B", 30), ("", 30)]),
                    &pad(&[("100", 3), ("", 30), ("ORPHAN", 30)]),
                ],
            )
            .with_records(
                "AGR_TEXTS",
                &[
                    &pad(&[("100", 3), ("Z_ROLE_A", 30), ("E", 1), ("Role A", 40)]),
                    &pad(&[("100", 3), ("Z_ROLE_A", 30), ("D", 1), ("Rolle A", 40)]),
                ],
            )
    }

    #[tokio::test]
    async fn table_records_decode_with_sub_tables() {
        let exec = executor(Arc::new(table_remote()), &table_config());
        let found = exec.search_table("roles", None).await.unwrap();
        assert_eq!(found.len(), 2);

        let a = &found[0];
        assert_eq!(a.id, "Z_ROLE_A");
        assert_eq!(a.get("PARENT_AGR"), Some(&[Value::text("Z_PARENT")][..]));
        assert_eq!(a.get("texts"), Some(&[Value::text("Role A")][..]));

        let b = &found[1];
        assert_eq!(b.get("PARENT_AGR"), Some(&[][..]));
        assert_eq!(b.get("texts"), Some(&[][..]));
    }

    #[tokio::test]
    async fn key_and_constants_are_pushed_down() {
        let remote = Arc::new(table_remote());
        let exec = executor(remote.clone(), &table_config());
        exec.search_table("AGR_DEFINE", Some(&Predicate::equals("USERNAME", "Z_ROLE_A")))
            .await
            .unwrap();
        assert_eq!(
            remote.calls(),
            vec![
                Call::Read {
                    table: "AGR_DEFINE".to_string(),
                    options: vec!["AGR_NAME = 'Z_ROLE_A'".to_string()],
                },
                Call::Read {
                    table: "AGR_TEXTS".to_string(),
                    options: vec![
                        "SPRAS = 'E'".to_string(),
                        "AGR_NAME = 'Z_ROLE_A'".to_string(),
                    ],
                },
            ]
        );
    }

    #[tokio::test]
    async fn opaque_table_filter_runs_in_memory() {
        let exec = executor(Arc::new(table_remote()), &table_config());
        let found = exec
            .search_table("roles", Some(&Predicate::equals("PARENT_AGR", "Z_PARENT")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "Z_ROLE_A");
    }

    #[tokio::test]
    async fn unknown_table_is_an_error() {
        let exec = executor(Arc::new(table_remote()), &table_config());
        assert!(matches!(
            exec.search_table("USR02", None).await,
            Err(ConnectorError::UnknownTable { name }) if name == "USR02"
        ));
    }

    #[test]
    fn composite_key_is_pushed_down_only_when_complete() {
        let schema = TableSchema::parse("T = A:2:KEY,B:2:KEY,C:2:KEY,D:2").unwrap();
        assert_eq!(
            read_options(&schema, Some("aa:bb:cc")),
            vec!["A = 'aa'", "B = 'bb'", "C = 'cc'"]
        );
        // `aa  cc` decodes to `aa:cc`; the blank middle part cannot be placed.
        assert!(read_options(&schema, Some("aa:cc")).is_empty());
        assert!(read_options(&schema, Some("aa:b:b:cc")).is_empty());
    }

    #[tokio::test]
    async fn composite_key_with_blank_part_is_found_in_memory() {
        let config = ConnectorConfig {
            tables: vec!["T = A:2:KEY,B:2:KEY,C:2:KEY,D:2".to_string()],
            ..ConnectorConfig::default()
        };
        let remote = Arc::new(
            FakeRemote::default().with_records("T", &["aa  ccdd", "aabbccee", "xx  ccff"]),
        );
        let exec = executor(remote.clone(), &config);
        let found = exec
            .search_table("T", Some(&Predicate::equals("USERNAME", "aa:cc")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("D"), Some(&[Value::text("dd")][..]));
        assert_eq!(
            remote.calls(),
            vec![Call::Read {
                table: "T".to_string(),
                options: Vec::new(),
            }]
        );
    }

    #[test]
    fn quotes_in_read_options_are_doubled() {
        let schema = TableSchema::parse("T = NAME:10:KEY").unwrap();
        assert_eq!(read_options(&schema, Some("O'NEIL")), vec!["NAME = 'O''NEIL'"]);
    }
}
