//! JSONL evaluation sink
//!
//! One line per evaluation, appended to a UTC day file under the logs
//! directory (`YYYYMMDD.jsonl`). Rotation happens lazily on the first write
//! after midnight; the sink never rewrites or truncates.

use chrono::Utc;
use eyre::{Result, WrapErr};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::pipeline::RouteEvaluation;

pub struct JsonlSink {
    dir: PathBuf,
    current: Option<(String, File)>,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).wrap_err_with(|| format!("creating log dir {}", dir.display()))?;
        Ok(Self { dir, current: None })
    }

    fn day_key() -> String {
        Utc::now().format("%Y%m%d").to_string()
    }

    fn file_for(&mut self, day: &str) -> Result<&mut File> {
        let stale = match &self.current {
            Some((d, _)) => d != day,
            None => true,
        };
        if stale {
            let path = self.dir.join(format!("{}.jsonl", day));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("opening {}", path.display()))?;
            info!("writing evaluations to {}", path.display());
            self.current = Some((day.to_string(), file));
        }
        match &mut self.current {
            Some((_, f)) => Ok(f),
            None => Err(eyre::eyre!("sink file handle missing after rotation")),
        }
    }

    /// Append one evaluation as a single JSON line
    pub fn write(&mut self, eval: &RouteEvaluation) -> Result<()> {
        self.write_for_day(&Self::day_key(), eval)
    }

    fn write_for_day(&mut self, day: &str, eval: &RouteEvaluation) -> Result<()> {
        let line = serde_json::to_string(eval).wrap_err("serializing evaluation")?;
        let file = self.file_for(day)?;
        writeln!(file, "{}", line).wrap_err("appending evaluation line")?;
        Ok(())
    }
}
