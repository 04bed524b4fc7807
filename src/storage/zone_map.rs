// File-level min/max statistics for partition pruning

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::planner::logical_plan::{Comparator, ComparisonExpr};
use crate::storage::csv_reader::DelimitedReader;
use crate::types::Value;

/// Zone map for one delimited file.
///
/// Tracks columns whose every value parsed as an integer. Persisted as a JSON
/// sidecar next to the source (`data.csv` -> `data.zonemap.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMap {
    pub filename: String,
    pub row_count: u64,
    pub min_values: BTreeMap<String, i64>,
    pub max_values: BTreeMap<String, i64>,
}

/// Sidecar location for a source file: its extension replaced by `.zonemap.json`.
pub fn sidecar_path<P: AsRef<Path>>(source: P) -> PathBuf {
    let source = source.as_ref();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}.zonemap.json"))
}

impl ZoneMap {
    /// Generate a zone map with a full scan of the file at `path`
    pub fn generate<P: AsRef<Path>>(path: P, delimiter: Option<u8>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::generate_from_reader(path.to_string_lossy(), BufReader::new(file), delimiter)
    }

    /// Generate a zone map from any delimited byte source.
    ///
    /// Integer columns are classified from the first data row. Every later
    /// row narrows their bounds; the first non-integer value drops a column
    /// for good, discarding what it had accumulated.
    pub fn generate_from_reader<R: BufRead>(
        filename: impl Into<String>,
        reader: R,
        delimiter: Option<u8>,
    ) -> Result<Self> {
        let mut reader = DelimitedReader::new(reader, delimiter);
        let header = reader
            .read_record()?
            .ok_or_else(|| QueryError::Parse("missing header row".to_string()))?;

        let mut zone_map = ZoneMap {
            filename: filename.into(),
            row_count: 0,
            min_values: BTreeMap::new(),
            max_values: BTreeMap::new(),
        };

        let first = match reader.read_record()? {
            Some(record) => record,
            None => return Ok(zone_map),
        };
        zone_map.row_count = 1;

        // (column position, name) of every still-tracked column
        let mut tracked: BTreeSet<(usize, String)> = BTreeSet::new();
        for (i, name) in header.iter().enumerate() {
            if let Some(v) = first.get(i).and_then(|raw| raw.parse::<i64>().ok()) {
                zone_map.min_values.insert(name.clone(), v);
                zone_map.max_values.insert(name.clone(), v);
                tracked.insert((i, name.clone()));
            }
        }

        while let Some(record) = reader.read_record()? {
            zone_map.row_count += 1;
            if tracked.is_empty() {
                continue;
            }

            let mut dropped = Vec::new();
            for (i, name) in &tracked {
                match record.get(*i).and_then(|raw| raw.parse::<i64>().ok()) {
                    Some(v) => {
                        if let Some(min) = zone_map.min_values.get_mut(name) {
                            *min = (*min).min(v);
                        }
                        if let Some(max) = zone_map.max_values.get_mut(name) {
                            *max = (*max).max(v);
                        }
                    }
                    None => dropped.push((*i, name.clone())),
                }
            }
            for (i, name) in dropped {
                zone_map.min_values.remove(&name);
                zone_map.max_values.remove(&name);
                tracked.remove(&(i, name));
            }
        }

        Ok(zone_map)
    }

    /// Write this zone map to the sidecar of its source file
    ///
    /// # Returns
    /// The sidecar path written
    pub fn save(&self) -> Result<PathBuf> {
        let path = sidecar_path(&self.filename);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Load a zone map from an explicit sidecar path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load the sidecar for `source`, treating absence or corruption as "no
    /// zone map" so that pruning is simply disabled.
    pub fn load_for<P: AsRef<Path>>(source: P) -> Option<Self> {
        let path = sidecar_path(source);
        match Self::load(&path) {
            Ok(zone_map) => Some(zone_map),
            Err(QueryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable zone map");
                None
            }
        }
    }

    /// Bounds of a tracked column
    pub fn bounds(&self, column: &str) -> Option<(i64, i64)> {
        Some((*self.min_values.get(column)?, *self.max_values.get(column)?))
    }

    /// Whether no row of the file can satisfy `column comparator literal`.
    ///
    /// Sound but conservative: `false` means "cannot tell". Untracked columns
    /// never prune.
    pub fn can_prune(&self, column: &str, comparator: Comparator, literal: i64) -> bool {
        let Some((min, max)) = self.bounds(column) else {
            return false;
        };

        match comparator {
            Comparator::Eq => literal < min || literal > max,
            Comparator::Lt => min >= literal,
            Comparator::Le => min > literal,
            Comparator::Gt => max <= literal,
            Comparator::Ge => max < literal,
            Comparator::Neq => min == max && min == literal,
        }
    }

    /// Whether any integer conjunct of a predicate rules the whole file out.
    /// Non-integer literals are never used for pruning.
    pub fn can_prune_predicate(&self, predicates: &[ComparisonExpr]) -> bool {
        self.pruning_conjunct(predicates).is_some()
    }

    /// First conjunct that rules the whole file out, if any
    pub fn pruning_conjunct<'a>(&self, predicates: &'a [ComparisonExpr]) -> Option<&'a ComparisonExpr> {
        predicates.iter().find(|p| match p.value {
            Value::Integer(literal) => self.can_prune(&p.column, p.comparator, literal),
            _ => false,
        })
    }

    /// Human-readable description of the tracked statistics
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Zone Map for: {}", self.filename);
        let _ = writeln!(out, "Row Count: {}", self.row_count);
        let _ = writeln!(out, "Integer Column Statistics:");
        for (column, min) in &self.min_values {
            if let Some(max) = self.max_values.get(column) {
                let _ = writeln!(out, "  {}: [{}, {}]", column, min, max);
            }
        }
        out
    }
}
