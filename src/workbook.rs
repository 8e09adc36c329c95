// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Excel workbook reports built from dated CSV exports.
//!
//! Input files follow the `<prefix>_<YYYYMMDD>.csv` naming scheme, where only
//! the latest file of each prefix is used. A [`WorkbookDefinition`] either maps
//! each prefix onto a fixed sheet, or combines every prefix into one sheet.
//!
//! Each generated workbook is saved twice: once with a timestamp in its name,
//! and once under its plain name so the latest report always has a stable
//! location.

use crate::config::{RowFilter, WorkbookDefinition};

use glob::Pattern;
use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

const MAX_COLUMN_WIDTH: usize = 50;

/// Rows of a CSV file, aligned to its header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read table from CSV file.
    ///
    /// Headers and cells are trimmed, and a leading byte order mark is
    /// dropped. Short rows are padded with empty cells.
    ///
    /// # Errors
    ///
    /// - Return [`WorkbookError::Csv`] if file cannot be read as CSV.
    /// - Return [`WorkbookError::EmptyFile`] if file has no header.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let to_error = |err: csv::Error| WorkbookError::Csv {
            source: err,
            path: path.display().to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(to_error)?;
        let headers = reader
            .headers()
            .map_err(to_error)?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
            .collect::<Vec<_>>();
        if headers.iter().all(String::is_empty) {
            return Err(WorkbookError::EmptyFile(path.to_path_buf()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(to_error)?;
            let mut row = record
                .iter()
                .take(headers.len())
                .map(|cell| cell.trim().to_string())
                .collect::<Vec<_>>();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        debug!("read {} row(s) from {:?}", rows.len(), path.display());

        Ok(Self { headers, rows })
    }

    /// Index of column, matched case-insensitively.
    pub fn column(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }

    /// Required columns missing from header.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|column| self.column(column).is_none())
            .cloned()
            .collect()
    }

    /// Keep only rows whose filter column holds one of the accepted values.
    ///
    /// Every row is dropped if the filter column does not exist.
    pub fn retain(&mut self, filter: &RowFilter) {
        let Some(index) = self.column(&filter.column) else {
            warn!("filter column {:?} not found, no rows kept", filter.column);
            self.rows.clear();
            return;
        };

        self.rows.retain(|row| {
            filter
                .values
                .iter()
                .any(|value| value.trim().eq_ignore_ascii_case(&row[index]))
        });
    }

    /// Stable ascending sort by columns, compared case-insensitively.
    ///
    /// Unknown columns are ignored.
    pub fn sort_by(&mut self, columns: &[String]) {
        let indices = columns
            .iter()
            .filter_map(|column| self.column(column))
            .collect::<Vec<_>>();
        if indices.is_empty() {
            return;
        }

        self.rows.sort_by_cached_key(|row| {
            indices
                .iter()
                .map(|index| row[*index].to_lowercase())
                .collect::<Vec<_>>()
        });
    }

    /// Append rows of other table, aligning cells by column name.
    ///
    /// Columns unknown to this table are added at the end.
    pub fn append(&mut self, other: Table) {
        let mapping = other
            .headers
            .iter()
            .map(|header| match self.column(header) {
                Some(index) => index,
                None => {
                    self.headers.push(header.clone());
                    self.headers.len() - 1
                }
            })
            .collect::<Vec<_>>();

        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }

        for row in other.rows {
            let mut aligned = vec![String::new(); self.headers.len()];
            for (cell, index) in row.into_iter().zip(mapping.iter()) {
                aligned[*index] = cell;
            }
            self.rows.push(aligned);
        }
    }

    /// Column widths as `min(longest + 2, 50)` characters.
    pub fn column_widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|index| {
                let longest = std::iter::once(&self.headers[index])
                    .chain(self.rows.iter().map(|row| &row[index]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or_default();
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

/// Find latest `<prefix>_<YYYYMMDD>.csv` file of each prefix in directory.
///
/// A missing directory yields no files.
///
/// # Errors
///
/// - Return [`WorkbookError::Pattern`] if directory cannot be used as a glob.
pub fn find_latest_files(input_dir: impl AsRef<Path>) -> Result<BTreeMap<String, PathBuf>> {
    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        warn!("input directory {:?} does not exist", input_dir.display());
        return Ok(BTreeMap::new());
    }

    let pattern = format!(
        "{}/*.csv",
        Pattern::escape(input_dir.to_string_lossy().as_ref())
    );
    let mut latest: BTreeMap<String, (String, PathBuf)> = BTreeMap::new();
    for path in glob::glob(&pattern)?.flatten() {
        let Some((prefix, date)) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(split_dated_name)
        else {
            continue;
        };

        let newer = latest
            .get(prefix)
            .is_none_or(|(current, _)| date > current.as_str());
        if newer {
            latest.insert(prefix.to_string(), (date.to_string(), path.clone()));
        }
    }

    Ok(latest
        .into_iter()
        .map(|(prefix, (_, path))| (prefix, path))
        .collect())
}

/// Split `<prefix>_<YYYYMMDD>.csv` into prefix and date.
pub fn split_dated_name(name: &str) -> Option<(&str, &str)> {
    let stem = name.strip_suffix(".csv")?;
    let (prefix, date) = stem.rsplit_once('_')?;
    if prefix.is_empty() || date.len() != 8 || !date.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    Some((prefix, date))
}

/// Sheets of a workbook, paired with the prefixes feeding them.
pub fn plan_sheets(
    definition: &WorkbookDefinition,
    discovered: &BTreeMap<String, PathBuf>,
) -> Vec<(String, Vec<String>)> {
    match &definition.combine_into {
        Some(sheet) if definition.sheets.is_empty() => {
            vec![(sheet.clone(), discovered.keys().cloned().collect())]
        }
        Some(sheet) => vec![(
            sheet.clone(),
            definition
                .sheets
                .iter()
                .map(|mapping| mapping.prefix.clone())
                .collect(),
        )],
        None => definition
            .sheets
            .iter()
            .map(|mapping| (mapping.sheet.clone(), vec![mapping.prefix.clone()]))
            .collect(),
    }
}

/// Load and shape every sheet of a workbook.
///
/// # Errors
///
/// - Return [`WorkbookError::MissingColumns`] if an input file lacks a
///   required column.
/// - Return [`WorkbookError::Csv`] or [`WorkbookError::EmptyFile`] if an
///   input file cannot be read.
#[instrument(skip(definition), fields(workbook = %definition.name), level = "debug")]
pub fn load_sheets(definition: &WorkbookDefinition) -> Result<Vec<(String, Table)>> {
    let discovered = find_latest_files(&definition.input_dir)?;
    shape_sheets(definition, &discovered)
}

fn shape_sheets(
    definition: &WorkbookDefinition,
    discovered: &BTreeMap<String, PathBuf>,
) -> Result<Vec<(String, Table)>> {
    let mut sheets = Vec::new();

    for (sheet, prefixes) in plan_sheets(definition, discovered) {
        let mut table = Table::default();
        for prefix in prefixes {
            let Some(path) = discovered.get(&prefix) else {
                warn!(
                    "no {prefix}_<YYYYMMDD>.csv in {:?}, sheet {sheet:?} misses its rows",
                    definition.input_dir.display()
                );
                continue;
            };
            info!("use {:?} for sheet {sheet:?}", path.display());

            let data = Table::read(path)?;
            let missing = data.missing_columns(&definition.required_columns);
            if !missing.is_empty() {
                return Err(WorkbookError::MissingColumns {
                    path: path.clone(),
                    missing,
                    found: data.headers,
                });
            }
            table.append(data);
        }

        if let Some(filter) = &definition.filter {
            let before = table.rows.len();
            table.retain(filter);
            info!("filtered sheet {sheet:?}: {before} -> {} row(s)", table.rows.len());
        }
        table.sort_by(&definition.sort_by);
        sheets.push((sheet, table));
    }

    Ok(sheets)
}

/// Write sheets into an xlsx file.
///
/// Header row is bold on a grey fill.
///
/// # Errors
///
/// - Return [`WorkbookError::Xlsx`] if workbook cannot be built or saved.
pub fn write_xlsx(sheets: &[(String, Table)], path: impl AsRef<Path>) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xCCCCCC));

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;

        for (col, title) in (0u16..).zip(table.headers.iter()) {
            worksheet.write_string_with_format(0, col, title, &header)?;
        }
        for (row, cells) in (1u32..).zip(table.rows.iter()) {
            for (col, cell) in (0u16..).zip(cells.iter()) {
                worksheet.write_string(row, col, cell)?;
            }
        }
        for (col, width) in (0u16..).zip(table.column_widths()) {
            worksheet.set_column_width(col, width as f64)?;
        }
    }

    workbook.save(path.as_ref())?;
    Ok(())
}

/// Output paths of a workbook: timestamped first, plain second.
pub fn output_paths(definition: &WorkbookDefinition, stamp: &str, dry_run: bool) -> [PathBuf; 2] {
    let suffix = if dry_run { "_dryrun" } else { "" };
    let name = &definition.name;
    [
        definition
            .output_dir
            .join(format!("{name}_{stamp}{suffix}.xlsx")),
        definition.output_dir.join(format!("{name}{suffix}.xlsx")),
    ]
}

/// Generate workbook and save it under both output paths.
///
/// A combined workbook without a single input file is not written at all,
/// and no paths are returned.
///
/// # Errors
///
/// - Return [`WorkbookError::Write`] if output directory cannot be created.
/// - Return any error of [`load_sheets`] or [`write_xlsx`].
#[instrument(skip(definition), fields(workbook = %definition.name), level = "debug")]
pub fn generate(definition: &WorkbookDefinition, stamp: &str, dry_run: bool) -> Result<Vec<PathBuf>> {
    let discovered = find_latest_files(&definition.input_dir)?;
    let has_input = plan_sheets(definition, &discovered)
        .iter()
        .flat_map(|(_, prefixes)| prefixes)
        .any(|prefix| discovered.contains_key(prefix));
    if definition.combine_into.is_some() && !has_input {
        warn!(
            "no input CSV files found in {:?}, skip workbook {:?}",
            definition.input_dir.display(),
            definition.name
        );
        return Ok(Vec::new());
    }

    let sheets = shape_sheets(definition, &discovered)?;

    mkdirp::mkdirp(&definition.output_dir).map_err(|err| WorkbookError::Write {
        source: err,
        path: definition.output_dir.display().to_string(),
    })?;

    let paths = output_paths(definition, stamp, dry_run);
    for path in &paths {
        write_xlsx(&sheets, path)?;
        info!("saved workbook {:?}", path.display());
    }

    Ok(paths.to_vec())
}

/// Workbook error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    /// Input file cannot be read as CSV.
    #[error("failed to read CSV {path:?}")]
    Csv {
        #[source]
        source: csv::Error,
        path: String,
    },

    /// Input file has no header.
    #[error("CSV {:?} is empty", .0.display())]
    EmptyFile(PathBuf),

    /// Input file lacks required columns.
    #[error("CSV {:?} lacks columns {missing:?}, found {found:?}", path.display())]
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// Output directory cannot be created.
    #[error("failed to create {path:?}")]
    Write {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Input directory is not a valid glob.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Workbook cannot be built or saved.
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkbookError> = std::result::Result<T, E>;
