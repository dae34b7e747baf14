//! CSV export and import of the vocab table.
//!
//! The file has one header row naming `term`, `translation`,
//! `knowledge_level` and `practice_at`. Export writes them in that order;
//! import matches them by name, so any column order is accepted.

use crate::db::Db;
use crate::schedule::MAX_KNOWLEDGE_LEVEL;
use chrono::{DateTime, Local, SecondsFormat};
use csv::StringRecord;
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;
use vocab_types::NewVocab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Term = 0,
    Translation = 1,
    KnowledgeLevel = 2,
    PracticeAt = 3,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Term,
        Column::Translation,
        Column::KnowledgeLevel,
        Column::PracticeAt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Term => "term",
            Column::Translation => "translation",
            Column::KnowledgeLevel => "knowledge_level",
            Column::PracticeAt => "practice_at",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Missing column: {column}")]
    MissingColumn { column: Column },

    /// `row` counts the header as row 1. `field` is `None` when the row
    /// itself is malformed (wrong number of fields).
    #[error("Invalid row {row}{}", describe_field(.field))]
    InvalidRow { row: usize, field: Option<Column> },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_field(field: &Option<Column>) -> String {
    match field {
        Some(column) => format!(", field: {}", column),
        None => String::new(),
    }
}

/// Timestamp format shared by export and import (RFC 3339, whole seconds).
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Local))
}

/// Writes every entry, in id order, to `writer`. Returns the number of rows
/// written below the header.
pub fn export<W: Write>(db: &Db, writer: W) -> Result<usize, TransferError> {
    let entries = db.find_every()?;

    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv_writer.write_record(Column::ALL.iter().map(|c| c.name()))?;

    for entry in &entries {
        let level = entry.knowledge_level.to_string();
        let practice_at = format_timestamp(&entry.practice_at);
        csv_writer.write_record([
            entry.term.as_str(),
            entry.translation.as_str(),
            level.as_str(),
            practice_at.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    log::info!("Exported {} vocab entries", entries.len());
    Ok(entries.len())
}

/// Adds every row of `reader` as a new entry. Nothing is stored unless every
/// row is valid.
pub fn import<R: Read>(db: &Db, reader: R) -> Result<usize, TransferError> {
    load(db, reader, false)
}

/// Like [`import`], but first removes all existing entries in the same
/// transaction. A failed import leaves the existing entries in place.
pub fn import_clean<R: Read>(db: &Db, reader: R) -> Result<usize, TransferError> {
    load(db, reader, true)
}

fn load<R: Read>(db: &Db, reader: R, clean: bool) -> Result<usize, TransferError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = ColumnMap::resolve(csv_reader.headers()?)?;

    let imported = db.transaction(|tx| {
        if clean {
            let removed = tx.delete_all()?;
            log::info!("Clean import: removing {} existing vocab entries", removed);
        }

        let mut count = 0;
        for (idx, record) in csv_reader.records().enumerate() {
            let row = idx + 2;
            let record = record.map_err(|e| columns.read_error(e, row))?;
            let vocab = columns.parse(&record, row)?;
            tx.create(&vocab)?;
            count += 1;
        }
        Ok::<_, TransferError>(count)
    })?;

    log::info!("Imported {} vocab entries", imported);
    Ok(imported)
}

/// Header positions of the recognised columns, resolved once per import.
struct ColumnMap {
    positions: [usize; 4],
    width: usize,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, TransferError> {
        let mut positions = [0; 4];
        for column in Column::ALL {
            positions[column as usize] = headers
                .iter()
                .position(|h| h == column.name())
                .ok_or(TransferError::MissingColumn { column })?;
        }
        Ok(Self {
            positions,
            width: headers.len(),
        })
    }

    fn column_at(&self, position: usize) -> Option<Column> {
        Column::ALL
            .into_iter()
            .find(|column| self.positions[*column as usize] == position)
    }

    /// Undecodable text is reported against its row like any other bad field.
    fn read_error(&self, err: csv::Error, row: usize) -> TransferError {
        match err.kind() {
            csv::ErrorKind::Utf8 { err: utf8, .. } => TransferError::InvalidRow {
                row,
                field: self.column_at(utf8.field()),
            },
            _ => TransferError::Csv(err),
        }
    }

    fn field<'r>(&self, record: &'r StringRecord, column: Column) -> &'r str {
        &record[self.positions[column as usize]]
    }

    fn parse(&self, record: &StringRecord, row: usize) -> Result<NewVocab, TransferError> {
        let invalid = |field| TransferError::InvalidRow { row, field };

        if record.len() != self.width {
            return Err(invalid(None));
        }

        let term = self.field(record, Column::Term);
        if term.is_empty() {
            return Err(invalid(Some(Column::Term)));
        }

        let translation = self.field(record, Column::Translation);
        if translation.is_empty() {
            return Err(invalid(Some(Column::Translation)));
        }

        let knowledge_level = self
            .field(record, Column::KnowledgeLevel)
            .parse::<u8>()
            .ok()
            .filter(|level| *level <= MAX_KNOWLEDGE_LEVEL)
            .ok_or_else(|| invalid(Some(Column::KnowledgeLevel)))?;

        let practice_at = parse_timestamp(self.field(record, Column::PracticeAt))
            .ok_or_else(|| invalid(Some(Column::PracticeAt)))?;

        Ok(NewVocab {
            term: term.to_string(),
            translation: translation.to_string(),
            knowledge_level,
            practice_at,
        })
    }
}
