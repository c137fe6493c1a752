//! Spectrometer raw exports
//!
//! The instrument writes one comma separated file per slot with a fixed size header
//! followed by one line per measured point. Only the columns listed in [RawLayout]
//! are read, by position.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum RawError {
    #[error("failed to open raw export {0:?}")]
    Open(PathBuf, #[source] std::io::Error),
    #[error("failed to read raw export")]
    Csv(#[from] csv::Error),
    #[error("line {line}: column {column} is missing or not a number")]
    MalformedRow { line: u64, column: usize },
    #[error("line {line}: column {column} is empty")]
    EmptyField { line: u64, column: usize },
}
type Result<T> = std::result::Result<T, RawError>;

/// Positions of the columns of interest in a raw export
#[derive(Debug, Clone, PartialEq)]
pub struct RawLayout {
    /// number of header lines
    pub skip_rows: usize,
    /// radial distance [mm]
    pub radius: usize,
    /// polar angle [degree]
    pub angle: usize,
    /// areal density channel [µg/cm²]
    pub density: usize,
    /// Mo atomic percent channel
    pub atomic_percent: usize,
    /// extra columns that must be populated for a row to be kept
    pub guards: Vec<usize>,
}
impl Default for RawLayout {
    fn default() -> Self {
        Self {
            skip_rows: 3,
            radius: 3,
            angle: 4,
            density: 5,
            atomic_percent: 7,
            guards: vec![9],
        }
    }
}
impl RawLayout {
    fn parse(&self, record: &csv::ByteRecord) -> Result<RawMeasurement> {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |column: usize| -> Result<f64> {
            record
                .get(column)
                .and_then(|bytes| std::str::from_utf8(bytes).ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| !v.is_nan())
                .ok_or(RawError::MalformedRow { line, column })
        };
        // guards only need a value, of any kind
        for &column in &self.guards {
            record
                .get(column)
                .filter(|bytes| !bytes.trim_ascii().is_empty())
                .ok_or(RawError::EmptyField { line, column })?;
        }
        Ok(RawMeasurement {
            radius: field(self.radius)?,
            angle: field(self.angle)?,
            density: field(self.density)?,
            atomic_percent: field(self.atomic_percent)?,
        })
    }
}

/// One instrument reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    /// radial distance [mm]
    pub radius: f64,
    /// polar angle [degree]
    pub angle: f64,
    /// areal density [µg/cm²]
    pub density: f64,
    /// Mo atomic percent
    pub atomic_percent: f64,
}

/// The complete readings of a raw export
#[derive(Debug, Default)]
pub struct RawExport {
    /// the readings, in file order
    pub measurements: Vec<RawMeasurement>,
    /// the number of incomplete rows that were dropped
    pub dropped: usize,
}
impl RawExport {
    /// Loads a raw export file
    pub fn from_path<P: AsRef<Path>>(path: P, layout: &RawLayout) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let file =
            std::fs::File::open(path).map_err(|e| RawError::Open(path.to_path_buf(), e))?;
        Self::from_reader(file, layout)
    }
    /// Loads a raw export from any reader
    pub fn from_reader<R: Read>(reader: R, layout: &RawLayout) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut export = RawExport::default();
        for result in rdr.byte_records().skip(layout.skip_rows) {
            let record = result?;
            match layout.parse(&record) {
                Ok(measurement) => export.measurements.push(measurement),
                Err(e) => {
                    log::debug!("dropping row: {}", e);
                    export.dropped += 1;
                }
            }
        }
        if export.dropped > 0 {
            log::info!("{} incomplete rows dropped", export.dropped);
        }
        Ok(export)
    }
    pub fn len(&self) -> usize {
        self.measurements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Sample,D24S1647.1
Recipe,MoS2 map
Point,Stage,X,R,Theta,Density,Mo counts,Mo at%,S counts,Flag
1,a,0,50,90,10,1,80,1,ok
2,a,0,20,180,12.5,1,75,1,ok
3,a,0,30,270,,1,70,1,ok
4,a,0,40,0,11,1,72,1,
5,a,0,10,45,9,1,abc,1,ok
6,a,0,10,45
";

    #[test]
    fn drop_incomplete_rows() {
        let export = RawExport::from_reader(EXPORT.as_bytes(), &RawLayout::default()).unwrap();
        assert_eq!(export.len(), 2);
        assert_eq!(export.dropped, 4);
        assert_eq!(
            export.measurements[0],
            RawMeasurement {
                radius: 50.,
                angle: 90.,
                density: 10.,
                atomic_percent: 80.,
            }
        );
        assert_eq!(export.measurements[1].density, 12.5);
    }

    #[test]
    fn non_utf8_header() {
        let mut bytes = b"\xe9chantillon\nx\nx\n".to_vec();
        bytes.extend_from_slice(b"1,a,0,50,90,10,1,80,1,ok\n");
        let export = RawExport::from_reader(bytes.as_slice(), &RawLayout::default()).unwrap();
        assert_eq!(export.len(), 1);
    }

    #[test]
    fn guard_column_is_not_parsed() {
        let export = RawExport::from_reader(
            "h\nh\nh\n1,a,0,50,90,10,1,80,1,ok\n2,a,0,50,90,10,1,80,1,7\n3,a,0,50,90,10,1,80,1,  \n"
                .as_bytes(),
            &RawLayout::default(),
        )
        .unwrap();
        assert_eq!(export.len(), 2);
        assert_eq!(export.dropped, 1);
    }

    #[test]
    fn missing_file() {
        let err = RawExport::from_path("/no/such/export.csv", &RawLayout::default()).unwrap_err();
        assert!(matches!(err, RawError::Open(..)));
    }
}
