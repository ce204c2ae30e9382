use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::path::Path;

use crate::frame::Frame;

pub struct CsvStorage;

impl CsvStorage {
    /// Writes a frame to CSV with a header row. Null cells are left empty.
    ///
    /// # Errors
    /// Returns error if the frame is ragged, the file cannot be created or writing fails
    pub fn write_frame(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
        frame.check_shape()?;
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(frame.column_names())?;

        for row in 0..frame.num_rows() {
            writer.write_record(frame.columns().iter().map(|c| c.data.display(row)))?;
        }

        writer.flush()?;
        Ok(())
    }
}
