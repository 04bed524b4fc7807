// Temporary sorted-run files for external sort

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::types::{Row, Value};

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// On-disk encoding of a value. Floats travel as raw bits so NaN and
/// infinities survive the JSON round trip.
#[derive(Serialize, Deserialize)]
enum SpilledValue {
    I(i64),
    F(u64),
    T(String),
    N,
}

impl From<&Value> for SpilledValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(v) => SpilledValue::I(*v),
            Value::Float(v) => SpilledValue::F(v.to_bits()),
            Value::Text(v) => SpilledValue::T(v.clone()),
            Value::Null => SpilledValue::N,
        }
    }
}

impl From<SpilledValue> for Value {
    fn from(value: SpilledValue) -> Self {
        match value {
            SpilledValue::I(v) => Value::Integer(v),
            SpilledValue::F(bits) => Value::Float(f64::from_bits(bits)),
            SpilledValue::T(v) => Value::Text(v),
            SpilledValue::N => Value::Null,
        }
    }
}

/// Build a run path unique to this process and call
fn unique_run_path(dir: &Path) -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| QueryError::Execution(format!("clock error: {e}")))?
        .as_nanos();
    let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
    Ok(dir.join(format!(
        "flatquery_sort_{}_{}_{:06}.jsonl",
        std::process::id(),
        nanos,
        seq
    )))
}

/// Write one sorted run of rows into a fresh file under `dir`.
///
/// Rows are written in the order given, one JSON line per row. If any write
/// fails the partially written file is removed before the error is returned.
///
/// # Returns
/// Path of the completed run file
pub fn write_run(dir: &Path, rows: &[Row]) -> Result<PathBuf> {
    write_run_with(dir, rows, BufWriter::new)
}

fn write_run_with<W, F>(dir: &Path, rows: &[Row], wrap: F) -> Result<PathBuf>
where
    W: Write,
    F: FnOnce(File) -> W,
{
    let path = unique_run_path(dir)?;
    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    match write_rows(wrap(file), rows) {
        Ok(()) => Ok(path),
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %remove_err, "failed to remove partial sort run");
            }
            Err(e)
        }
    }
}

fn write_rows<W: Write>(mut writer: W, rows: &[Row]) -> Result<()> {
    for row in rows {
        let encoded: Vec<SpilledValue> = row.values().iter().map(SpilledValue::from).collect();
        let line = serde_json::to_string(&encoded)
            .map_err(|e| QueryError::Execution(format!("sort run encode failed: {e}")))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Sequential reader over one run file
pub struct RunReader {
    lines: Lines<BufReader<File>>,
}

impl RunReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }

    /// Next row of the run, or `None` once the run is exhausted
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        for line in self.lines.by_ref() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let encoded: Vec<SpilledValue> = serde_json::from_str(&line)
                .map_err(|e| QueryError::Execution(format!("sort run decode failed: {e}")))?;
            return Ok(Some(Row::new(encoded.into_iter().map(Value::from).collect())));
        }
        Ok(None)
    }
}

/// Delete a run file. Failure is logged and otherwise ignored.
pub fn remove_run(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove sort run");
        }
    }
}
