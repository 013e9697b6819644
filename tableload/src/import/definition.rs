//! Import definitions.
//!
//! An [`ImportDefinition`] is the immutable configuration of one run. It is
//! built in code with [`ImportDefinition::builder`] or loaded from a JSON
//! [`DefinitionFile`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::naming::table_name_for;
use crate::error::{ConfigError, ConfigResult};
use crate::events::DEFAULT_PREFIX;
use crate::mapping::Spec;
use crate::source::CsvOptions;

/// Default number of records fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Configuration of one import run.
pub struct ImportDefinition {
    /// Owning type name, used in errors and for the default table.
    pub name: String,
    pub table: Option<String>,
    pub csv: CsvOptions,
    pub text: Option<String>,
    pub stream: Option<Box<dyn Read + Send>>,
    pub file: Option<PathBuf>,
    pub mapping: Spec,
    pub additional_fields: Spec,
    pub ignored_columns: Spec,
    /// Row 1 is a header and is not imported.
    pub omit_header: bool,
    /// Row 1 seeds an identity mapping.
    pub header_as_table_field: bool,
    pub page_size: usize,
    /// Opt-in: rows whose source fields are all blank are skipped and
    /// counted instead of inserted.
    pub skip_empty_rows: bool,
    /// Check the table and its columns before reading any row.
    pub verify_table: bool,
    pub event_prefix: String,
}

impl ImportDefinition {
    pub fn builder(name: impl Into<String>) -> ImportDefinitionBuilder {
        ImportDefinitionBuilder::new(name)
    }

    /// Explicit table, or one derived from the name.
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(table) if !table.trim().is_empty() => table.trim().to_string(),
            _ => table_name_for(&self.name),
        }
    }

    /// File read when no other origin is configured: `<table>.csv`.
    pub fn default_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.csv", self.table_name()))
    }

    /// Records to skip before the first data row.
    pub fn header_offset(&self) -> usize {
        usize::from(self.omit_header || self.header_as_table_field)
    }
}

impl fmt::Debug for ImportDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("csv", &self.csv)
            .field("text", &self.text.as_ref().map(|t| t.len()))
            .field("stream", &self.stream.is_some())
            .field("file", &self.file)
            .field("mapping", &self.mapping)
            .field("omit_header", &self.omit_header)
            .field("header_as_table_field", &self.header_as_table_field)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ImportDefinition`].
pub struct ImportDefinitionBuilder {
    definition: ImportDefinition,
}

impl ImportDefinitionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ImportDefinition {
                name: name.into(),
                table: None,
                csv: CsvOptions::default(),
                text: None,
                stream: None,
                file: None,
                mapping: Spec::default(),
                additional_fields: Spec::default(),
                ignored_columns: Spec::List(Vec::new()),
                omit_header: true,
                header_as_table_field: false,
                page_size: DEFAULT_PAGE_SIZE,
                skip_empty_rows: false,
                verify_table: false,
                event_prefix: DEFAULT_PREFIX.to_string(),
            },
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.definition.table = Some(table.into());
        self
    }

    pub fn csv(mut self, csv: CsvOptions) -> Self {
        self.definition.csv = csv;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.definition.csv.delimiter = delimiter;
        self
    }

    pub fn enclosure(mut self, enclosure: char) -> Self {
        self.definition.csv.enclosure = enclosure;
        self
    }

    pub fn escape(mut self, escape: char) -> Self {
        self.definition.csv.escape = escape;
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.definition.csv.encoding = Some(encoding.into());
        self
    }

    /// In-memory content; wins over stream and file.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.definition.text = Some(text.into());
        self
    }

    /// Open byte stream; wins over file.
    pub fn stream(mut self, stream: Box<dyn Read + Send>) -> Self {
        self.definition.stream = Some(stream);
        self
    }

    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.definition.file = Some(file.into());
        self
    }

    pub fn mapping(mut self, mapping: impl Into<Spec>) -> Self {
        self.definition.mapping = mapping.into();
        self
    }

    pub fn additional_fields(mut self, fields: impl Into<Spec>) -> Self {
        self.definition.additional_fields = fields.into();
        self
    }

    pub fn ignored_columns(mut self, columns: impl Into<Spec>) -> Self {
        self.definition.ignored_columns = columns.into();
        self
    }

    pub fn omit_header(mut self, omit: bool) -> Self {
        self.definition.omit_header = omit;
        self
    }

    pub fn header_as_table_field(mut self, enabled: bool) -> Self {
        self.definition.header_as_table_field = enabled;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.definition.page_size = size;
        self
    }

    pub fn skip_empty_rows(mut self, skip: bool) -> Self {
        self.definition.skip_empty_rows = skip;
        self
    }

    pub fn verify_table(mut self, verify: bool) -> Self {
        self.definition.verify_table = verify;
        self
    }

    pub fn event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.definition.event_prefix = prefix.into();
        self
    }

    /// Check the options that do not depend on the source.
    pub fn build(self) -> ConfigResult<ImportDefinition> {
        let definition = self.definition;
        definition.csv.validate()?;
        if definition.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(definition)
    }
}

// =============================================================================
// Definition files
// =============================================================================

/// JSON form of an import definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    pub name: String,

    #[serde(default)]
    pub table: Option<String>,

    /// CSV path, relative to the definition file
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Inline CSV content
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_enclosure")]
    pub enclosure: String,

    #[serde(default = "default_escape")]
    pub escape: String,

    /// Encoding label (detected when unset)
    #[serde(default)]
    pub encoding: Option<String>,

    #[serde(default)]
    pub mapping: Value,

    #[serde(default)]
    pub additional_fields: Value,

    #[serde(default)]
    pub ignored_columns: Value,

    #[serde(default = "default_true")]
    pub omit_header: bool,

    #[serde(default)]
    pub header_as_table_field: bool,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub skip_empty_rows: bool,

    #[serde(default)]
    pub verify_table: bool,

    #[serde(default = "default_prefix")]
    pub event_prefix: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_enclosure() -> String {
    "\"".to_string()
}

fn default_escape() -> String {
    "\\".to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl DefinitionFile {
    /// Read and parse a definition file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::DefinitionRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), name = %file.name, "loaded definition");
        Ok(file)
    }

    /// Compile into a definition. Relative `file` paths are resolved
    /// against `base_dir`.
    pub fn into_definition(self, base_dir: Option<&Path>) -> ConfigResult<ImportDefinition> {
        let csv = CsvOptions {
            encoding: self.encoding,
            ..CsvOptions::from_strings(&self.delimiter, &self.enclosure, &self.escape)?
        };

        let mut builder = ImportDefinition::builder(self.name)
            .csv(csv)
            .mapping(Spec::from_json(&self.mapping)?)
            .additional_fields(Spec::from_json(&self.additional_fields)?)
            .ignored_columns(Spec::from_json(&self.ignored_columns)?)
            .omit_header(self.omit_header)
            .header_as_table_field(self.header_as_table_field)
            .page_size(self.page_size)
            .skip_empty_rows(self.skip_empty_rows)
            .verify_table(self.verify_table)
            .event_prefix(self.event_prefix);

        if let Some(table) = self.table {
            builder = builder.table(table);
        }
        if let Some(content) = self.content {
            builder = builder.text(content);
        }
        if let Some(file) = self.file {
            let file = match base_dir {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file,
            };
            builder = builder.file(file);
        }

        builder.build()
    }
}

/// Load a definition file and compile it, resolving paths next to it.
pub fn load_definition(path: &Path) -> ConfigResult<ImportDefinition> {
    DefinitionFile::load(path)?.into_definition(path.parent())
}

/// Example definition printed by the `example` command.
pub fn example_definition() -> Value {
    json!({
        "name": "Company",
        "file": "companies.csv",
        "delimiter": ",",
        "omit_header": true,
        "header_as_table_field": true,
        "mapping": {
            "Company Name": "name",
            "Street": "address",
            "Logo": ["image_url", {"required": true}],
            "Internal Ref": "internal_ref"
        },
        "additional_fields": {
            "created_by": "importer",
            "country": {"source": "Country", "default": "US"}
        },
        "ignored_columns": ["Internal Ref"],
        "page_size": 100
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_builder_defaults() {
        let definition = ImportDefinition::builder("CompanyProvider").build().unwrap();
        assert_eq!(definition.table_name(), "company_providers");
        assert_eq!(definition.default_file(), PathBuf::from("company_providers.csv"));
        assert_eq!(definition.page_size, 100);
        assert!(definition.omit_header);
        assert!(!definition.header_as_table_field);
        assert!(!definition.skip_empty_rows);
        assert_eq!(definition.header_offset(), 1);
        assert_eq!(definition.event_prefix, "dataset::");
    }

    #[test]
    fn test_header_offset() {
        let data_only = ImportDefinition::builder("Company").omit_header(false).build().unwrap();
        assert_eq!(data_only.header_offset(), 0);

        let seeded = ImportDefinition::builder("Company")
            .omit_header(false)
            .header_as_table_field(true)
            .build()
            .unwrap();
        assert_eq!(seeded.header_offset(), 1);
    }

    #[test]
    fn test_build_rejects_bad_options() {
        let err = ImportDefinition::builder("Company").page_size(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPageSize));

        let err = ImportDefinition::builder("Company").delimiter('→').build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCharacter { option: "delimiter", .. }));
    }

    #[test]
    fn test_explicit_table_wins() {
        let definition = ImportDefinition::builder("Company").table("firms").build().unwrap();
        assert_eq!(definition.table_name(), "firms");
    }

    #[test]
    fn test_definition_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("companies.json");
        std::fs::write(&path, serde_json::to_string(&example_definition()).unwrap()).unwrap();

        let definition = load_definition(&path).unwrap();
        assert_eq!(definition.name, "Company");
        assert_eq!(definition.file, Some(dir.path().join("companies.csv")));
        assert!(definition.header_as_table_field);
        assert!(!definition.skip_empty_rows);
        assert_eq!(definition.mapping.kind(), "map");
        assert_eq!(definition.additional_fields.kind(), "map");
    }

    #[test]
    fn test_definition_file_rejects_unknown_keys() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "Company", "mapings": {{}}}}"#).unwrap();
        let err = DefinitionFile::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DefinitionFormat(_)));
    }

    #[test]
    fn test_missing_definition_file() {
        let err = load_definition(Path::new("/no/such/definition.json")).unwrap_err();
        assert!(matches!(err, ConfigError::DefinitionRead { .. }));
    }

    #[test]
    fn test_invalid_delimiter_in_file() {
        let file: DefinitionFile = serde_json::from_value(json!({"name": "Company", "delimiter": ";;"})).unwrap();
        let err = file.into_definition(None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCharacter { option: "delimiter", .. }));
    }
}
