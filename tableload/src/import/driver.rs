//! Batch import driver.
//!
//! Runs one import: lifecycle events, option checks, column planning, then
//! a paging loop that builds each row's values and inserts them.
//!
//! ```text
//! starting ─▶ prepared-reader ─▶ table-exists ─▶ plan ─▶ pages ─▶ finished
//!     │              │                │                    │
//!     └── veto ──────┴──── veto ──────┘              error (per row)
//!            ▼
//!         exiting
//! ```

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::definition::ImportDefinition;
use super::naming::ordinal;
use crate::error::{ConfigError, ImportResult, SourceResult};
use crate::events::{Event, Notifier, Stage};
use crate::models::{ColumnBinding, ImportReport, ImportStatus, Row, RowError, Transformed};
use crate::plan::{parse_additional_fields, parse_ignored_columns, ImportPlan};
use crate::sink::{InsertStatement, RelationalSink, StatementGuard};
use crate::source::{CsvSource, Origin, OriginKind, RecordSource};

/// One import run over an injected sink and notifier.
pub struct Importer<'a> {
    definition: ImportDefinition,
    sink: &'a mut dyn RelationalSink,
    notifier: &'a mut dyn Notifier,
    source: Option<Box<dyn RecordSource + 'a>>,
}

impl<'a> Importer<'a> {
    pub fn new(
        definition: ImportDefinition,
        sink: &'a mut dyn RelationalSink,
        notifier: &'a mut dyn Notifier,
    ) -> Self {
        Self {
            definition,
            sink,
            notifier,
            source: None,
        }
    }

    /// Read from `source` instead of the definition's origin.
    pub fn with_record_source(mut self, source: Box<dyn RecordSource + 'a>) -> Self {
        self.source = Some(source);
        self
    }

    /// Run the import.
    ///
    /// Configuration, source and sink setup failures are returned as errors
    /// before any row is inserted. Vetoes and sink failures during paging
    /// end in a report whose status says so.
    pub fn import(self) -> ImportResult<ImportReport> {
        let Importer {
            definition,
            sink,
            notifier,
            source,
        } = self;

        let mut run = Run::new(&definition, notifier);
        let span = info_span!("import", run_id = %run.run_id, definition = %definition.name);
        let _enter = span.enter();

        info!("import starting");
        let status = run.execute(definition, sink, source)?;
        Ok(run.finish(status))
    }
}

/// Run-local state and counters.
struct Run<'n> {
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    owner: String,
    prefix: String,
    table: String,
    notifier: &'n mut dyn Notifier,
    inserted: usize,
    rejected: usize,
    skipped_empty: usize,
    pages: usize,
    errors: Vec<RowError>,
}

enum RowOutcome {
    Insert(Vec<Value>),
    Rejected { message: String, values: Map<String, Value> },
}

impl<'n> Run<'n> {
    fn new(definition: &ImportDefinition, notifier: &'n mut dyn Notifier) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            owner: definition.name.clone(),
            prefix: definition.event_prefix.clone(),
            table: definition.table_name(),
            notifier,
            inserted: 0,
            rejected: 0,
            skipped_empty: 0,
            pages: 0,
            errors: Vec::new(),
        }
    }

    fn execute<'s>(
        &mut self,
        mut definition: ImportDefinition,
        sink: &mut dyn RelationalSink,
        source: Option<Box<dyn RecordSource + 's>>,
    ) -> ImportResult<ImportStatus> {
        if let Some(status) = self.checkpoint(Stage::Starting, json!({})) {
            return Ok(status);
        }

        let (mut source, kind): (Box<dyn RecordSource + 's>, OriginKind) = match source {
            Some(source) => (source, OriginKind::Custom),
            None => {
                let (source, kind) = open_origin(&mut definition)?;
                (Box::new(source), kind)
            }
        };
        if let Some(status) = self.checkpoint(Stage::PreparedReader, json!({ "origin": kind })) {
            return Ok(status);
        }

        if self.table.is_empty() {
            return Err(ConfigError::MissingTable.into());
        }
        if definition.verify_table && !sink.table_exists(&self.table)? {
            return Err(ConfigError::TableNotFound(self.table.clone()).into());
        }
        if let Some(status) = self.checkpoint(Stage::TableExists, json!({ "table": self.table })) {
            return Ok(status);
        }

        let owner = self.owner.as_str();
        let additional = parse_additional_fields(&definition.additional_fields, owner)?;
        let ignored = parse_ignored_columns(&definition.ignored_columns, owner)?;
        let header = if definition.header_as_table_field {
            Some(source.read_header()?)
        } else {
            None
        };
        let plan = ImportPlan::build(header.as_deref(), &definition.mapping, &ignored, additional, owner)?;

        if definition.verify_table {
            let columns = sink.column_names(&self.table)?;
            if let Some(missing) = plan.fields.iter().find(|f| !columns.contains(f)) {
                return Err(ConfigError::UnknownColumn {
                    table: self.table.clone(),
                    column: missing.clone(),
                }
                .into());
            }
        }

        let statement = InsertStatement::new(&self.table, &plan.fields)?;
        let mut guard = StatementGuard::prepare(sink, statement)?;

        self.page_through(&definition, &plan, source.as_mut(), &mut guard)
    }

    fn page_through(
        &mut self,
        definition: &ImportDefinition,
        plan: &ImportPlan,
        source: &mut dyn RecordSource,
        guard: &mut StatementGuard<'_>,
    ) -> ImportResult<ImportStatus> {
        let page_size = definition.page_size;
        let header_offset = definition.header_offset();
        let field_names = plan.columns.source_columns();

        for page in 0.. {
            let total_offset = page * page_size + header_offset;
            let rows = source.fetch_page(total_offset, page_size, &field_names)?;
            if rows.is_empty() {
                break;
            }
            self.pages += 1;
            info!(page = page + 1, rows = rows.len(), "loaded {} page", ordinal(page + 1));

            for (position, row) in rows.iter().enumerate() {
                let row_number = total_offset + position + 1;

                if definition.skip_empty_rows && row.values().all(|v| v.trim().is_empty()) {
                    debug!(row = row_number, "skipping blank row");
                    self.skipped_empty += 1;
                    continue;
                }

                let values = match assemble_row(plan, row, row_number, &self.owner) {
                    RowOutcome::Insert(values) => values,
                    RowOutcome::Rejected { message, values } => {
                        self.rejected += 1;
                        self.report_row_error(row_number, message, values);
                        continue;
                    }
                };

                if let Err(err) = guard.execute(&values) {
                    let values: Map<String, Value> = plan.fields.iter().cloned().zip(values).collect();
                    warn!(row = row_number, error = %err, "insert failed, stopping");
                    self.report_row_error(row_number, err.to_string(), values);
                    return Ok(ImportStatus::Failed);
                }
                self.inserted += 1;
            }
        }

        Ok(ImportStatus::Completed)
    }

    /// Emit a boundary event; on veto emit `exiting` and return the abort.
    fn checkpoint(&mut self, stage: Stage, payload: Value) -> Option<ImportStatus> {
        let event = self.event(stage, payload);
        if !self.notifier.notify(&event).is_veto() {
            return None;
        }

        warn!(event = %event.name, "stage vetoed, exiting");
        let exiting = self.event(Stage::Exiting, json!({ "event": event.name }));
        self.notifier.notify(&exiting);
        Some(ImportStatus::Aborted { stage: event.name })
    }

    fn report_row_error(&mut self, row: usize, message: String, values: Map<String, Value>) {
        warn!(row, message = %message, "row error");
        let error = RowError { row, message, values };
        let payload = json!({ "message": error.message, "row": error.row, "values": error.values });
        let event = self.event(Stage::Error, payload);
        self.notifier.notify(&event);
        self.errors.push(error);
    }

    /// Every payload carries the owning definition name under `class`.
    fn event(&self, stage: Stage, payload: Value) -> Event {
        let mut body = Map::new();
        body.insert("class".to_string(), Value::String(self.owner.clone()));
        if let Value::Object(fields) = payload {
            body.extend(fields);
        }
        Event::new(&self.prefix, stage, Value::Object(body))
    }

    fn finish(mut self, status: ImportStatus) -> ImportReport {
        let report = ImportReport {
            run_id: self.run_id,
            status,
            table: std::mem::take(&mut self.table),
            inserted: self.inserted,
            rejected: self.rejected,
            skipped_empty: self.skipped_empty,
            pages: self.pages,
            errors: std::mem::take(&mut self.errors),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };

        let event = self.event(
            Stage::Finished,
            json!({ "status": report.status, "inserted": report.inserted, "rejected": report.rejected }),
        );
        self.notifier.notify(&event);
        info!(summary = %report.summary(), "import finished");
        report
    }
}

/// Open the definition's origin: text, then stream, then file, then
/// `<table>.csv`.
fn open_origin(definition: &mut ImportDefinition) -> SourceResult<(CsvSource, OriginKind)> {
    let origin = Origin::choose(
        definition.text.take(),
        definition.stream.take(),
        definition.file.take(),
    )
    .unwrap_or_else(|| Origin::File(definition.default_file()));
    let kind = origin.kind();
    Ok((CsvSource::open(origin, &definition.csv)?, kind))
}

/// Column plan a definition would import with. Reads the header when the
/// definition asks for it; no sink or notifier is involved.
pub fn plan_for(mut definition: ImportDefinition) -> ImportResult<ImportPlan> {
    let owner = definition.name.clone();
    let additional = parse_additional_fields(&definition.additional_fields, &owner)?;
    let ignored = parse_ignored_columns(&definition.ignored_columns, &owner)?;
    let header = if definition.header_as_table_field {
        let (mut source, _) = open_origin(&mut definition)?;
        Some(source.read_header()?)
    } else {
        None
    };
    Ok(ImportPlan::build(header.as_deref(), &definition.mapping, &ignored, additional, &owner)?)
}

/// Values for one row in insert-field order: plan entries, then additional
/// fields. A transformer returning `Skip` rejects the row with the values
/// built so far.
fn assemble_row(plan: &ImportPlan, row: &Row, row_number: usize, owner: &str) -> RowOutcome {
    let mut values = Vec::with_capacity(plan.fields.len());
    let mut partial = Map::new();

    for entry in plan.columns.entries() {
        let value = match &entry.binding {
            ColumnBinding::Excluded => continue,
            ColumnBinding::Identity | ColumnBinding::Renamed(_) => {
                Value::String(row.get(&entry.source_column).cloned().unwrap_or_default())
            }
            ColumnBinding::Computed { target, transform } => match transform.call(row, row_number) {
                Transformed::Value(value) => value,
                Transformed::Skip => {
                    debug!(row = row_number, field = %target, "row rejected by mapping transformer");
                    return RowOutcome::Rejected {
                        message: format!("`{}` from {}::mapping rejected the row", entry.source_column, owner),
                        values: partial,
                    };
                }
            },
        };
        if let Some(target) = entry.target_field() {
            partial.insert(target.to_string(), value.clone());
        }
        values.push(value);
    }

    for field in &plan.additional {
        match field.evaluate(row, row_number) {
            Transformed::Value(value) => {
                partial.insert(field.name.clone(), value.clone());
                values.push(value);
            }
            Transformed::Skip => {
                return RowOutcome::Rejected {
                    message: format!("`{}` from {}::additional_fields rejected the row", field.name, owner),
                    values: partial,
                };
            }
        }
    }

    RowOutcome::Insert(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ImportError, SourceError};
    use crate::events::{EventBus, Verdict};
    use crate::mapping::Spec;
    use crate::sink::{MemorySink, SqliteSink};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const COMPANIES: &str = "name,address,image_url\n\
        Acme,1 Main St,http://a.io/1.png\n\
        Globex,2 Side Rd,http://a.io/2.png\n\
        Initech,3 Loop Ave,http://a.io/3.png\n\
        Umbrella,4 Hill Ct,http://a.io/4.png\n\
        Hooli,5 Bay Blvd,http://a.io/5.png\n";

    /// Records every event and optionally vetoes one stage.
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        veto: Option<Stage>,
    }

    impl Recorder {
        fn vetoing(stage: Stage) -> Self {
            Self {
                events: Vec::new(),
                veto: Some(stage),
            }
        }

        fn names(&self) -> Vec<String> {
            self.events.iter().map(|e| e.name.clone()).collect()
        }

        fn of(&self, stage: Stage) -> Vec<&Event> {
            self.events.iter().filter(|e| e.stage == stage).collect()
        }
    }

    impl Notifier for Recorder {
        fn notify(&mut self, event: &Event) -> Verdict {
            self.events.push(event.clone());
            Verdict::from(self.veto != Some(event.stage))
        }
    }

    /// Wraps a CSV source and counts page fetches.
    struct CountingSource {
        inner: CsvSource,
        fetches: Arc<Mutex<usize>>,
    }

    impl RecordSource for CountingSource {
        fn read_header(&mut self) -> SourceResult<Vec<String>> {
            self.inner.read_header()
        }

        fn fetch_page(&mut self, offset: usize, limit: usize, names: &[String]) -> SourceResult<Vec<Row>> {
            *self.fetches.lock().unwrap() += 1;
            self.inner.fetch_page(offset, limit, names)
        }
    }

    fn counting(text: &str) -> (Box<CountingSource>, Arc<Mutex<usize>>) {
        let fetches = Arc::new(Mutex::new(0));
        let source = CountingSource {
            inner: CsvSource::from_text(text, &Default::default()).unwrap(),
            fetches: Arc::clone(&fetches),
        };
        (Box::new(source), fetches)
    }

    fn companies() -> crate::import::ImportDefinitionBuilder {
        ImportDefinition::builder("Company")
            .text(COMPANIES)
            .header_as_table_field(true)
    }

    fn run(definition: ImportDefinition, sink: &mut MemorySink, notifier: &mut Recorder) -> ImportResult<ImportReport> {
        Importer::new(definition, sink, notifier).import()
    }

    fn names_in(sink: &MemorySink, table: &str) -> Vec<String> {
        sink.rows(table)
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_round_trip_identity() {
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let mut events = Recorder::default();

        let report = run(companies().build().unwrap(), &mut sink, &mut events).unwrap();

        assert!(report.is_success());
        assert_eq!(report.inserted, 5);
        assert_eq!(report.table, "companies");
        let rows = sink.rows("companies");
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["name"], "Acme");
        assert_eq!(rows[0]["address"], "1 Main St");
        assert_eq!(rows[4]["image_url"], "http://a.io/5.png");
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["name", "address", "image_url"]);
    }

    #[test]
    fn test_event_sequence() {
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let mut events = Recorder::default();

        run(companies().build().unwrap(), &mut sink, &mut events).unwrap();

        assert_eq!(
            events.names(),
            vec![
                "dataset::starting",
                "dataset::prepared-reader",
                "dataset::table-exists",
                "dataset::finished"
            ]
        );
        assert_eq!(events.of(Stage::PreparedReader)[0].payload["origin"], "string");
        assert_eq!(events.of(Stage::TableExists)[0].payload["table"], "companies");
        assert_eq!(events.of(Stage::Starting)[0].payload["class"], "Company");
        assert_eq!(events.of(Stage::Finished)[0].payload["status"]["status"], "completed");
    }

    #[test]
    fn test_constant_additional_field() {
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let definition = companies()
            .additional_fields(Spec::map([("created_by", "importer")]))
            .build()
            .unwrap();

        run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert!(sink.rows("companies").iter().all(|r| r["created_by"] == "importer"));
    }

    #[test]
    fn test_renamed_and_computed_columns() {
        let mut sink = MemorySink::new().with_table("companies", &["company", "address", "logo", "slug"]);
        let definition = ImportDefinition::builder("Company")
            .text(COMPANIES)
            .mapping(Spec::map([
                ("name", Spec::from("company")),
                ("address", Spec::from("address")),
                (
                    "image_url",
                    Spec::List(vec![
                        Spec::from("logo"),
                        Spec::callable(|row, _| Transformed::from(row["image_url"].replace("http://", "https://"))),
                    ]),
                ),
                ("slug", Spec::callable(|row, _| Transformed::from(row["slug"].to_lowercase()))),
            ]))
            .build()
            .unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.inserted, 5);
        let first = &sink.rows("companies")[0];
        assert_eq!(first["company"], "Acme");
        assert_eq!(first["logo"], "https://a.io/1.png");
        // slug is the fourth source column, absent from the file
        assert_eq!(first["slug"], "");
    }

    #[test]
    fn test_rejected_row_is_skipped_and_run_succeeds() {
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let mut events = Recorder::default();
        let definition = companies()
            .mapping(Spec::map([(
                "name",
                Spec::callable(|row, _| match row["name"].as_str() {
                    "Globex" => Transformed::Skip,
                    other => Transformed::from(other.to_uppercase()),
                }),
            )]))
            .build()
            .unwrap();

        let report = run(definition, &mut sink, &mut events).unwrap();

        assert_eq!(report.status, ImportStatus::Completed);
        assert_eq!(report.inserted, 4);
        assert_eq!(report.rejected, 1);
        assert_eq!(names_in(&sink, "companies"), vec!["ACME", "INITECH", "UMBRELLA", "HOOLI"]);

        let error = &report.errors[0];
        assert_eq!(error.row, 3);
        assert!(error.message.contains("`name` from Company::mapping"));
        assert!(error.values.is_empty());

        let error_events = events.of(Stage::Error);
        assert_eq!(error_events.len(), 1);
        assert_eq!(error_events[0].payload["row"], 3);
    }

    #[test]
    fn test_additional_field_rejection_keeps_partial_values() {
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let definition = companies()
            .additional_fields(Spec::map([
                ("created_by", Spec::from("importer")),
                ("batch", Spec::callable(|_, n| if n == 4 { Transformed::Skip } else { Transformed::from("b1") })),
            ]))
            .build()
            .unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert!(report.is_success());
        assert_eq!(report.inserted, 4);
        let error = &report.errors[0];
        assert_eq!(error.row, 4);
        assert!(error.message.contains("`batch` from Company::additional_fields"));
        assert_eq!(error.values["name"], "Initech");
        assert_eq!(error.values["created_by"], "importer");
        assert!(!error.values.contains_key("batch"));
    }

    #[test]
    fn test_row_numbers_are_absolute() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let definition = companies()
            .page_size(2)
            .additional_fields(Spec::map([(
                "row",
                Spec::callable(move |_, n| {
                    recorded.lock().unwrap().push(n);
                    Transformed::Value(json!(n))
                }),
            )]))
            .build()
            .unwrap();

        let mut sink = MemorySink::new().with_table("companies", &[]);
        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2, 3, 4, 5, 6]);
        assert_eq!(report.pages, 3);
    }

    #[test]
    fn test_without_header_row_numbers_start_at_one() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let definition = ImportDefinition::builder("Company")
            .text("Acme,1 Main St\nGlobex,2 Side Rd\n")
            .omit_header(false)
            .mapping(Spec::map([
                ("name", Spec::from("name")),
                (
                    "address",
                    Spec::callable(move |row, n| {
                        recorded.lock().unwrap().push(n);
                        Transformed::from(row["address"].clone())
                    }),
                ),
            ]))
            .build()
            .unwrap();

        let mut sink = MemorySink::new().with_table("companies", &[]);
        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(names_in(&sink, "companies"), vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_sink_failure_stops_paging() {
        let mut sink = MemorySink::new()
            .with_table("companies", &[])
            .fail_when(|row| (row["name"] == "Initech").then(|| "UNIQUE constraint failed: companies.name".to_string()));
        let definition = companies().page_size(2).build().unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.status, ImportStatus::Failed);
        assert!(!report.is_success());
        // rows of the first page stay, Umbrella (same page, after Initech) is never attempted
        assert_eq!(names_in(&sink, "companies"), vec!["Acme", "Globex"]);
        assert_eq!(sink.executed(), 3);
        assert_eq!(report.pages, 2);
        assert_eq!(report.errors[0].row, 4);
        assert_eq!(report.errors[0].values["name"], "Initech");
        assert!(report.errors[0].message.contains("UNIQUE"));
        assert_eq!(sink.finished(), 1);
    }

    #[test]
    fn test_sink_failure_keeps_earlier_rows_of_same_page() {
        let mut sink = MemorySink::new()
            .with_table("companies", &[])
            .fail_when(|row| (row["name"] == "Globex").then(|| "disk full".to_string()));
        let report = run(companies().build().unwrap(), &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.status, ImportStatus::Failed);
        assert_eq!(names_in(&sink, "companies"), vec!["Acme"]);
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_veto_at_each_boundary() {
        for stage in [Stage::Starting, Stage::PreparedReader, Stage::TableExists] {
            let (source, fetches) = counting(COMPANIES);
            let mut sink = MemorySink::new().with_table("companies", &[]);
            let mut events = Recorder::vetoing(stage);

            let report = Importer::new(companies().build().unwrap(), &mut sink, &mut events)
                .with_record_source(source)
                .import()
                .unwrap();

            let vetoed = format!("dataset::{}", stage);
            assert_eq!(report.status, ImportStatus::Aborted { stage: vetoed.clone() });
            assert_eq!(*fetches.lock().unwrap(), 0, "{stage}");
            assert_eq!(sink.executed(), 0);
            assert_eq!(sink.finished(), 0);

            let exiting = events.of(Stage::Exiting);
            assert_eq!(exiting.len(), 1, "{stage}");
            assert_eq!(exiting[0].payload["event"], vetoed);
        }
    }

    #[test]
    fn test_veto_through_event_bus() {
        let mut bus = EventBus::new();
        bus.listen("dataset::table-exists", |e| Verdict::from(e.payload["table"] != "companies"));
        let mut sink = MemorySink::new().with_table("companies", &[]);

        let report = Importer::new(companies().build().unwrap(), &mut sink, &mut bus)
            .import()
            .unwrap();

        assert_eq!(
            report.status,
            ImportStatus::Aborted {
                stage: "dataset::table-exists".into()
            }
        );
        assert!(sink.rows("companies").is_empty());
    }

    #[test]
    fn test_rejected_mapping_fetches_nothing() {
        let (source, fetches) = counting(COMPANIES);
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let definition = companies()
            .mapping(Spec::map([("username", Spec::from("name")), ("password", Spec::from(false))]))
            .build()
            .unwrap();

        let err = Importer::new(definition, &mut sink, &mut Recorder::default())
            .with_record_source(source)
            .import()
            .unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("`password`"));
        assert_eq!(*fetches.lock().unwrap(), 0);
        assert_eq!(sink.executed(), 0);
    }

    #[test]
    fn test_no_columns_fetches_nothing() {
        let (source, fetches) = counting(COMPANIES);
        let mut sink = MemorySink::new();
        let definition = ImportDefinition::builder("Company").build().unwrap();

        let err = Importer::new(definition, &mut sink, &mut Recorder::default())
            .with_record_source(source)
            .import()
            .unwrap_err();

        assert!(matches!(err, ImportError::Config(ConfigError::NoColumns { .. })));
        assert_eq!(*fetches.lock().unwrap(), 0);
    }

    #[test]
    fn test_option_shapes_are_checked() {
        let definition = companies().additional_fields(Spec::list(["created_by"])).build().unwrap();
        let err = run(definition, &mut MemorySink::new(), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, ImportError::Config(ConfigError::AdditionalFieldsNotKeyed { .. })));

        let definition = companies().ignored_columns(Spec::map([("name", true)])).build().unwrap();
        let err = run(definition, &mut MemorySink::new(), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, ImportError::Config(ConfigError::IgnoredColumnsKeyed { .. })));
    }

    #[test]
    fn test_ignored_columns_are_not_inserted() {
        let mut sink = MemorySink::new().with_table("companies", &["name", "address"]);
        let definition = companies().ignored_columns(vec!["image_url"]).build().unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert!(report.is_success());
        assert!(!sink.rows("companies")[0].contains_key("image_url"));
    }

    #[test]
    fn test_blank_rows_inserted_by_default() {
        let text = "name,address\n,\n";
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let definition = ImportDefinition::builder("Company")
            .text(text)
            .header_as_table_field(true)
            .additional_fields(Spec::map([("created_by", "importer")]))
            .build()
            .unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert!(report.is_success());
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_empty, 0);
        let rows = sink.rows("companies");
        assert_eq!(rows[0]["name"], "");
        assert_eq!(rows[0]["created_by"], "importer");
    }

    #[test]
    fn test_blank_rows_skipped_when_asked() {
        let text = "name,address\nAcme,1 Main St\n,\nGlobex,2 Side Rd\n";
        let mut sink = MemorySink::new().with_table("companies", &[]);
        let definition = ImportDefinition::builder("Company")
            .text(text)
            .header_as_table_field(true)
            .skip_empty_rows(true)
            .build()
            .unwrap();

        let report = run(definition, &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(names_in(&sink, "companies"), vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_duplicate_header_fetches_nothing() {
        let (source, fetches) = counting("id,name,name,email\n1,Ann,Annie,ann@x.io\n");
        let mut sink = MemorySink::new().with_table("members", &[]);
        let definition = ImportDefinition::builder("Member")
            .header_as_table_field(true)
            .build()
            .unwrap();

        let err = Importer::new(definition, &mut sink, &mut Recorder::default())
            .with_record_source(source)
            .import()
            .unwrap_err();

        assert!(matches!(
            err,
            ImportError::Config(ConfigError::DuplicateColumn { ref column, .. }) if column == "name"
        ));
        assert_eq!(*fetches.lock().unwrap(), 0);
        assert!(sink.rows("members").is_empty());
    }

    #[test]
    fn test_missing_table_fails_at_insert() {
        let mut sink = MemorySink::new();
        let report = run(companies().build().unwrap(), &mut sink, &mut Recorder::default()).unwrap();

        assert_eq!(report.status, ImportStatus::Failed);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("no such table"));
        assert_eq!(sink.executed(), 1);
    }

    #[test]
    fn test_verify_table() {
        let definition = companies().verify_table(true).build().unwrap();
        let err = run(definition, &mut MemorySink::new(), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, ImportError::Config(ConfigError::TableNotFound(ref t)) if t == "companies"));

        let mut sink = MemorySink::new().with_table("companies", &["name", "address"]);
        let definition = companies().verify_table(true).build().unwrap();
        let err = run(definition, &mut sink, &mut Recorder::default()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Config(ConfigError::UnknownColumn { ref column, .. }) if column == "image_url"
        ));
        assert_eq!(sink.executed(), 0);
    }

    #[test]
    fn test_missing_table_name() {
        let mut definition = companies().table("  ").build().unwrap();
        definition.name = String::new();
        let err = run(definition, &mut MemorySink::new(), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, ImportError::Config(ConfigError::MissingTable)));
    }

    #[test]
    fn test_default_file_from_table_name() {
        let definition = ImportDefinition::builder("NoSuchDataset").build().unwrap();
        let err = run(definition, &mut MemorySink::new(), &mut Recorder::default()).unwrap_err();
        match err {
            ImportError::Source(SourceError::FileNotFound(path)) => {
                assert_eq!(path.to_string_lossy(), "no_such_datasets.csv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_event_prefix() {
        let mut events = Recorder::default();
        let definition = companies().event_prefix("companies.").build().unwrap();
        run(definition, &mut MemorySink::new().with_table("companies", &[]), &mut events).unwrap();
        assert_eq!(events.names()[0], "companies.starting");
    }

    #[test]
    fn test_plan_for_reads_header() {
        let definition = companies()
            .ignored_columns(vec!["image_url"])
            .additional_fields(Spec::map([("created_by", "importer")]))
            .build()
            .unwrap();

        let plan = plan_for(definition).unwrap();

        assert_eq!(plan.fields, vec!["name", "address", "created_by"]);
        assert_eq!(plan.describe()["insert_fields"][2], "created_by");
    }

    #[test]
    fn test_plan_for_without_header_needs_no_source() {
        let definition = ImportDefinition::builder("Company")
            .file("/no/such/file.csv")
            .mapping(Spec::map([("name", "title")]))
            .build()
            .unwrap();

        let plan = plan_for(definition).unwrap();
        assert_eq!(plan.fields, vec!["title"]);
    }

    #[test]
    fn test_sqlite_round_trip() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("companies.csv");
        std::fs::write(&csv_path, COMPANIES).unwrap();

        let mut sink = SqliteSink::open(&dir.path().join("load.db")).unwrap();
        sink.connection()
            .execute_batch(
                "CREATE TABLE companies (id INTEGER PRIMARY KEY, name TEXT, address TEXT, image_url TEXT, created_by TEXT)",
            )
            .unwrap();

        let definition = ImportDefinition::builder("Company")
            .file(&csv_path)
            .header_as_table_field(true)
            .verify_table(true)
            .additional_fields(Spec::map([("created_by", "importer")]))
            .build()
            .unwrap();
        let mut events = Recorder::default();
        let report = Importer::new(definition, &mut sink, &mut events).import().unwrap();

        assert!(report.is_success());
        assert_eq!(events.of(Stage::PreparedReader)[0].payload["origin"], "file");

        let count: i64 = sink
            .connection()
            .query_row("SELECT COUNT(*) FROM companies WHERE created_by = 'importer'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 5);
        let third: String = sink
            .connection()
            .query_row("SELECT name FROM companies WHERE id = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(third, "Initech");
    }
}
