//! Code for reading the ground-motion recording database.
use super::{input_err_msg, is_sorted_and_unique};
use crate::error::SelectionError;
use crate::id::RecordIdentity;
use crate::recording::{Ec8Class, Recording, RecordingDatabase, ResponseSpectrum};
use anyhow::{Context, Result, ensure};
use csv::StringRecord;
use itertools::Itertools;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Metadata columns which must be present in the database file
const METADATA_COLUMNS: [&str; 9] = [
    "source",
    "record_id",
    "event_id",
    "station_id",
    "magnitude",
    "rjb",
    "vs30",
    "ec8",
    "depth",
];

/// Name of the PGA column
const PGA_COLUMN: &str = "PGA";

/// Prefix of spectral acceleration columns, which are named `T<period>`
const PERIOD_COLUMN_PREFIX: char = 'T';

/// Positions of the columns of interest in the database file
struct ColumnLayout {
    /// Index of each of [`METADATA_COLUMNS`]
    metadata: [usize; METADATA_COLUMNS.len()],
    /// Index of the PGA column, if present
    pga: Option<usize>,
    /// Index of each spectral column, in order of period
    spectral: Vec<usize>,
    /// Period of each spectral column
    periods: Vec<f64>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|header| header == name);

        let mut metadata = [0; METADATA_COLUMNS.len()];
        for (idx, name) in metadata.iter_mut().zip(METADATA_COLUMNS) {
            *idx = position(name).with_context(|| format!("Missing column: {name}"))?;
        }

        let columns = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                let period = header.strip_prefix(PERIOD_COLUMN_PREFIX)?;
                Some(
                    period
                        .parse::<f64>()
                        .with_context(|| format!("Invalid spectral column name: {header}"))
                        .map(|period| (period, idx)),
                )
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect_vec();
        let (periods, spectral): (Vec<f64>, Vec<usize>) = columns.into_iter().unzip();
        ensure!(!periods.is_empty(), "No spectral columns (T<period>) found");
        ensure!(
            periods[0] > 0.0 && is_sorted_and_unique(&periods),
            "Spectral column periods must be positive and unique"
        );

        Ok(Self {
            metadata,
            pga: position(PGA_COLUMN),
            spectral,
            periods,
        })
    }
}

/// Parse a number, treating an empty field as missing
fn parse_ordinate(field: &str) -> Result<f64> {
    if field.is_empty() {
        return Ok(f64::NAN);
    }

    field
        .parse()
        .with_context(|| format!("Invalid spectral ordinate: {field}"))
}

fn parse_recording(
    record: &StringRecord,
    layout: &ColumnLayout,
    periods: &Arc<[f64]>,
) -> Result<Recording> {
    let field = |i: usize| &record[layout.metadata[i]];
    let number = |i: usize| -> Result<f64> {
        field(i)
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", METADATA_COLUMNS[i], field(i)))
    };

    let ec8 = match field(7) {
        "" => None,
        code => Some(
            code.parse::<Ec8Class>()
                .with_context(|| format!("Invalid EC8 code: {code}"))?,
        ),
    };

    let ordinates = layout
        .spectral
        .iter()
        .map(|idx| parse_ordinate(&record[*idx]))
        .collect::<Result<Vec<_>>>()?;
    let pga = layout
        .pga
        .map(|idx| parse_ordinate(&record[idx]))
        .transpose()?;

    Ok(Recording {
        identity: RecordIdentity::new(field(0), field(1), field(2), field(3)),
        magnitude: number(4)?,
        rjb: number(5)?,
        vs30: number(6)?,
        ec8,
        depth: number(8)?,
        spectrum: ResponseSpectrum {
            periods: Arc::clone(periods),
            ordinates,
            pga,
        },
    })
}

fn read_database_inner(file_path: &Path) -> Result<RecordingDatabase> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let layout = ColumnLayout::from_headers(reader.headers()?)?;
    let periods: Arc<[f64]> = Arc::from(layout.periods.as_slice());

    let mut recordings = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let recording = record
            .map_err(anyhow::Error::from)
            .and_then(|record| parse_recording(&record, &layout, &periods))
            .with_context(|| format!("Invalid row {}", row + 1))?;
        recordings.push(recording);
    }
    ensure!(!recordings.is_empty(), "Database contains no recordings");

    Ok(RecordingDatabase { recordings })
}

/// Read the recording database flat-file.
///
/// The file must contain the columns `source,record_id,event_id,station_id,magnitude,rjb,vs30,
/// ec8,depth`, an optional `PGA` column and one spectral column per period, named `T<period>`.
/// Spectral accelerations are in g; empty cells denote missing ordinates.
///
/// # Arguments
///
/// * `file_path` - Path to the database CSV file
pub fn read_database(file_path: &Path) -> Result<RecordingDatabase> {
    let database = read_database_inner(file_path).map_err(|err| {
        SelectionError::InputData(format!("{}: {:#}", input_err_msg(file_path), err))
    })?;

    info!(
        "Read {} recordings from {} (sources: {})",
        database.recordings.len(),
        file_path.display(),
        database.sources().join(", ")
    );

    Ok(database)
}
