//! Record schema for the movie catalogue.
//!
//! Declares, per entity kind, which columns are requested from the source,
//! their semantic types and their generation-time defaults. The schema is
//! pure metadata; [`ColumnSelector`] turns it into a select list and a row
//! shaping step once per table, before any query is built.

mod coerce;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ColumnMode;
use crate::core::identifier::quote_ident;
use crate::core::Row;
use crate::error::{MigrateError, Result};

/// The five transferred table types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    FilmWork,
    Genre,
    Person,
    GenreFilmWork,
    PersonFilmWork,
}

impl EntityKind {
    /// All entity kinds in referential-safety order: parents before
    /// the association tables that reference them.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::FilmWork,
        EntityKind::Genre,
        EntityKind::Person,
        EntityKind::GenreFilmWork,
        EntityKind::PersonFilmWork,
    ];

    /// Table name, identical in source and destination.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::FilmWork => "film_work",
            EntityKind::Genre => "genre",
            EntityKind::Person => "person",
            EntityKind::GenreFilmWork => "genre_film_work",
            EntityKind::PersonFilmWork => "person_film_work",
        }
    }

    /// Look up an entity kind by table name.
    pub fn from_table(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.table_name() == name)
    }

    /// Kinds whose rows this kind references.
    pub fn parents(self) -> &'static [EntityKind] {
        match self {
            EntityKind::FilmWork | EntityKind::Genre | EntityKind::Person => &[],
            EntityKind::GenreFilmWork => &[EntityKind::FilmWork, EntityKind::Genre],
            EntityKind::PersonFilmWork => &[EntityKind::FilmWork, EntityKind::Person],
        }
    }

    /// The record schema for this kind.
    pub fn schema(self) -> &'static EntitySchema {
        match self {
            EntityKind::FilmWork => &FILM_WORK,
            EntityKind::Genre => &GENRE,
            EntityKind::Person => &PERSON,
            EntityKind::GenreFilmWork => &GENRE_FILM_WORK,
            EntityKind::PersonFilmWork => &PERSON_FILM_WORK,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Uuid,
    Text,
    Float,
    Date,
    Timestamp,
}

/// Value supplied when a field is absent or NULL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    None,
    GenerateUuid,
    Float(f64),
}

/// One column of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub default: FieldDefault,
}

impl FieldSpec {
    const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: FieldDefault::None,
        }
    }

    const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: FieldDefault::None,
        }
    }

    const fn defaulted(name: &'static str, ty: FieldType, default: FieldDefault) -> Self {
        Self {
            name,
            ty,
            required: false,
            default,
        }
    }

    const fn id() -> Self {
        Self::defaulted("id", FieldType::Uuid, FieldDefault::GenerateUuid)
    }

    /// Whether the field gets a value even when the source lacks it.
    pub fn has_default(&self) -> bool {
        !matches!(self.default, FieldDefault::None)
    }
}

/// Ordered field list of one entity kind.
#[derive(Debug, PartialEq)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
}

impl EntitySchema {
    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields to request from a source table that exposes `available` columns.
    ///
    /// Optional fields the table lacks are left out of the select list;
    /// a missing required field is an error.
    pub fn resolve(&self, available: &[String]) -> Result<Vec<&'static str>> {
        let mut columns = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            if available.iter().any(|c| c == field.name) {
                columns.push(field.name);
            } else if field.required {
                return Err(MigrateError::invalid_row(
                    self.kind.table_name(),
                    format!("source table has no required column '{}'", field.name),
                ));
            }
        }
        Ok(columns)
    }

    /// Validate a raw row against the schema and coerce its values.
    ///
    /// The result holds the schema's fields in declaration order. Absent or
    /// NULL fields with a default receive it (a fresh UUID for `id`, 0.0 for
    /// `rating`); columns outside the schema are dropped.
    pub fn coerce(&self, raw: &Row) -> Result<Row> {
        let table = self.kind.table_name();
        self.fields
            .iter()
            .filter_map(|field| {
                coerce::field_value(field, raw.get(field.name))
                    .map(|value| value.map(|v| (field.name, v)))
                    .map_err(|message| MigrateError::invalid_row(table, message))
                    .transpose()
            })
            .collect()
    }
}

static FILM_WORK: EntitySchema = EntitySchema {
    kind: EntityKind::FilmWork,
    fields: &[
        FieldSpec::id(),
        FieldSpec::required("title", FieldType::Text),
        FieldSpec::optional("description", FieldType::Text),
        FieldSpec::optional("creation_date", FieldType::Date),
        FieldSpec::defaulted("rating", FieldType::Float, FieldDefault::Float(0.0)),
        FieldSpec::required("type", FieldType::Text),
        FieldSpec::optional("created_at", FieldType::Timestamp),
        FieldSpec::optional("updated_at", FieldType::Timestamp),
    ],
};

static GENRE: EntitySchema = EntitySchema {
    kind: EntityKind::Genre,
    fields: &[
        FieldSpec::id(),
        FieldSpec::required("name", FieldType::Text),
        FieldSpec::optional("description", FieldType::Text),
        FieldSpec::optional("created_at", FieldType::Timestamp),
        FieldSpec::optional("updated_at", FieldType::Timestamp),
    ],
};

static PERSON: EntitySchema = EntitySchema {
    kind: EntityKind::Person,
    fields: &[
        FieldSpec::id(),
        FieldSpec::required("full_name", FieldType::Text),
        FieldSpec::optional("created_at", FieldType::Timestamp),
        FieldSpec::optional("updated_at", FieldType::Timestamp),
    ],
};

static GENRE_FILM_WORK: EntitySchema = EntitySchema {
    kind: EntityKind::GenreFilmWork,
    fields: &[
        FieldSpec::id(),
        FieldSpec::required("film_work_id", FieldType::Uuid),
        FieldSpec::required("genre_id", FieldType::Uuid),
        FieldSpec::optional("created_at", FieldType::Timestamp),
    ],
};

static PERSON_FILM_WORK: EntitySchema = EntitySchema {
    kind: EntityKind::PersonFilmWork,
    fields: &[
        FieldSpec::id(),
        FieldSpec::required("film_work_id", FieldType::Uuid),
        FieldSpec::required("person_id", FieldType::Uuid),
        FieldSpec::optional("role", FieldType::Text),
        FieldSpec::optional("created_at", FieldType::Timestamp),
    ],
};

/// How the columns of a table are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnSelector {
    /// Every column the source table has, rows passed through as read.
    All,

    /// The record schema's fields, rows coerced to their types.
    Schema(&'static EntitySchema),
}

impl ColumnSelector {
    /// Selector for an entity kind under the configured column mode.
    pub fn for_kind(kind: EntityKind, mode: ColumnMode) -> Self {
        match mode {
            ColumnMode::All => ColumnSelector::All,
            ColumnMode::Schema => ColumnSelector::Schema(kind.schema()),
        }
    }

    /// Fix the select list against the columns a source table actually has.
    pub fn resolve(&self, available: &[String]) -> Result<ResolvedSelector> {
        match self {
            ColumnSelector::All => Ok(ResolvedSelector::All),
            ColumnSelector::Schema(schema) => Ok(ResolvedSelector::Fields {
                schema: *schema,
                columns: schema.resolve(available)?,
            }),
        }
    }
}

/// A selector bound to one source table.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSelector {
    All,
    Fields {
        schema: &'static EntitySchema,
        columns: Vec<&'static str>,
    },
}

impl ResolvedSelector {
    /// The select list: `*` or the quoted column names.
    pub fn select_list(&self) -> Result<String> {
        match self {
            ResolvedSelector::All => Ok("*".to_string()),
            ResolvedSelector::Fields { columns, .. } => Ok(columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")),
        }
    }

    /// Turn a fetched row into the row handed to the writer.
    pub fn shape(&self, raw: Row) -> Result<Row> {
        match self {
            ResolvedSelector::All => Ok(raw),
            ResolvedSelector::Fields { schema, .. } => schema.coerce(&raw),
        }
    }
}
