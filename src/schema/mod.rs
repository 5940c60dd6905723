use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::info;

static TABLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)$").unwrap()
});

/// Tables of the bundled music-store sample database.
const MUSIC_STORE: &[(&str, &[&str], &str)] = &[
    ("Album", &["AlbumId", "Title", "ArtistId"], "Stores information about music albums."),
    ("Artist", &["ArtistId", "Name"], "Contains data about music artists."),
    (
        "Customer",
        &[
            "CustomerId", "FirstName", "LastName", "Company", "Address", "City", "State",
            "Country", "PostalCode", "Phone", "Fax", "Email", "SupportRepId",
        ],
        "Holds customer information.",
    ),
    (
        "Employee",
        &[
            "EmployeeId", "LastName", "FirstName", "Title", "ReportsTo", "BirthDate", "HireDate",
            "Address", "City", "State", "Country", "PostalCode", "Phone", "Fax", "Email",
        ],
        "Stores employee details.",
    ),
    ("Genre", &["GenreId", "Name"], "Represents music genres."),
    (
        "Invoice",
        &[
            "InvoiceId", "CustomerId", "InvoiceDate", "BillingAddress", "BillingCity",
            "BillingState", "BillingCountry", "BillingPostalCode", "Total",
        ],
        "Contains invoice information.",
    ),
    (
        "InvoiceLine",
        &["InvoiceLineId", "InvoiceId", "TrackId", "UnitPrice", "Quantity"],
        "Represents individual items within an invoice.",
    ),
    ("MediaType", &["MediaTypeId", "Name"], "Stores media types for tracks."),
    ("Playlist", &["PlaylistId", "Name"], "Contains user-created playlists."),
    ("PlaylistTrack", &["PlaylistId", "TrackId"], "Associates tracks with playlists."),
    (
        "Track",
        &[
            "TrackId", "Name", "AlbumId", "MediaTypeId", "GenreId", "Composer", "Milliseconds",
            "Bytes", "UnitPrice",
        ],
        "Stores detailed information about each music track.",
    ),
];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected `Table(col, ...)` but found `{content}`")]
    Malformed { line: usize, content: String },

    #[error("line {line}: comment appears before any table definition")]
    OrphanComment { line: usize },

    #[error("table `{0}` is defined more than once")]
    DuplicateTable(String),

    #[error("schema contains no tables")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub description: Option<String>,
}

impl TableDescriptor {
    /// `Name(col1, col2, ...)`, the form used as a matching key when pruning.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.columns.join(", "))
    }
}

/// Read-only description of the relational schema the service answers against.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    tables: Vec<TableDescriptor>,
}

impl SchemaCatalog {
    pub fn new(tables: Vec<TableDescriptor>) -> Result<Self, SchemaError> {
        if tables.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for table in &tables {
            if !seen.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        Ok(Self { tables })
    }

    pub fn builtin() -> Self {
        let tables = MUSIC_STORE
            .iter()
            .map(|(name, columns, description)| TableDescriptor {
                name: name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                description: Some(description.to_string()),
            })
            .collect();

        Self { tables }
    }

    /// Loads the catalog from a commented schema file, or the bundled one when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        match path {
            Some(path) => {
                info!("Loading schema catalog from {}", path.display());
                let text = std::fs::read_to_string(path)?;
                Self::parse(&text)
            }
            None => {
                info!("Using built-in music store schema catalog");
                Ok(Self::builtin())
            }
        }
    }

    /// Parses the commented text format: a `Table(col, ...)` line followed by `# ...` lines.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let mut tables: Vec<TableDescriptor> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                let table = tables
                    .last_mut()
                    .ok_or(SchemaError::OrphanComment { line: idx + 1 })?;
                let comment = comment.trim();
                match &mut table.description {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(comment);
                    }
                    None => table.description = Some(comment.to_string()),
                }
                continue;
            }

            let caps = TABLE_LINE.captures(line).ok_or_else(|| SchemaError::Malformed {
                line: idx + 1,
                content: line.to_string(),
            })?;

            let columns = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();

            tables.push(TableDescriptor {
                name: caps[1].to_string(),
                columns,
                description: None,
            });
        }

        Self::new(tables)
    }

    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Table signatures only; this is what the relevance model sees.
    pub fn render_plain(&self) -> String {
        self.tables
            .iter()
            .map(TableDescriptor::signature)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Table signatures each followed by their `# ` description lines.
    pub fn render_commented(&self) -> String {
        let mut lines = Vec::with_capacity(self.tables.len() * 2);
        for table in &self.tables {
            lines.push(table.signature());
            if let Some(description) = &table.description {
                lines.extend(description.lines().map(|l| format!("# {}", l)));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalog_renders_both_variants() {
        let catalog = SchemaCatalog::builtin();
        assert_eq!(catalog.tables().len(), 11);

        let plain = catalog.render_plain();
        assert!(plain.starts_with("Album(AlbumId, Title, ArtistId)\nArtist(ArtistId, Name)"));
        assert!(!plain.contains('#'));

        let commented = catalog.render_commented();
        assert!(commented.starts_with(
            "Album(AlbumId, Title, ArtistId)\n# Stores information about music albums.\nArtist("
        ));
    }

    #[test]
    fn parse_reads_back_commented_rendering() {
        let catalog = SchemaCatalog::builtin();
        let reparsed = SchemaCatalog::parse(&catalog.render_commented()).unwrap();
        assert_eq!(reparsed.tables(), catalog.tables());
    }

    #[test]
    fn parse_joins_multiple_comment_lines_and_skips_blanks() {
        let text = "Orders(id, total)\n\n# Customer orders.\n# One row per checkout.\nItems(id)\n";
        let catalog = SchemaCatalog::parse(text).unwrap();
        assert_eq!(
            catalog.tables()[0].description.as_deref(),
            Some("Customer orders.\nOne row per checkout.")
        );
        assert_eq!(catalog.tables()[1].columns, vec!["id".to_string()]);
        assert_eq!(catalog.tables()[1].description, None);
    }

    #[test]
    fn parse_rejects_duplicates_and_orphans() {
        assert!(matches!(
            SchemaCatalog::parse("A(x)\nA(y)"),
            Err(SchemaError::DuplicateTable(name)) if name == "A"
        ));
        assert!(matches!(
            SchemaCatalog::parse("# floating\nA(x)"),
            Err(SchemaError::OrphanComment { line: 1 })
        ));
        assert!(matches!(
            SchemaCatalog::parse("not a table"),
            Err(SchemaError::Malformed { line: 1, .. })
        ));
        assert!(matches!(SchemaCatalog::parse("\n\n"), Err(SchemaError::Empty)));
    }

    #[test]
    fn load_reads_schema_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Widget(WidgetId, Name)\n# Things we sell.").unwrap();

        let catalog = SchemaCatalog::load(Some(file.path())).unwrap();
        assert_eq!(catalog.render_plain(), "Widget(WidgetId, Name)");

        let builtin = SchemaCatalog::load(None).unwrap();
        assert_eq!(builtin.tables().len(), 11);
    }
}
