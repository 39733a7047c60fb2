use super::StepSnapshot;
use anyhow::Result;
use csv::Writer;
use std::fs::File;
use std::path::Path;

/// Appends one row per worker/task/step to three CSV files, mirroring the
/// shape of the per-step snapshot. Flushed every step so a crashed run still
/// leaves usable data.
pub struct StepLogger {
    workers: Writer<File>,
    tasks: Writer<File>,
    commander: Writer<File>,
}

impl StepLogger {
    pub fn new(out_dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)?;
        Ok(Self {
            workers: Writer::from_path(out_dir.join(format!("{prefix}_workers.csv")))?,
            tasks: Writer::from_path(out_dir.join(format!("{prefix}_tasks.csv")))?,
            commander: Writer::from_path(out_dir.join(format!("{prefix}_commander.csv")))?,
        })
    }

    pub fn log(&mut self, snapshot: &StepSnapshot) -> Result<()> {
        for row in &snapshot.workers {
            self.workers.serialize(row)?;
        }
        for row in &snapshot.tasks {
            self.tasks.serialize(row)?;
        }
        self.commander.serialize(&snapshot.commander)?;
        self.workers.flush()?;
        self.tasks.flush()?;
        self.commander.flush()?;
        Ok(())
    }
}
