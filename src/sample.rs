use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::domain::TVError;

/// Writes `nrows` student records as a snappy compressed parquet file.
pub fn write_sample(path: &Path, nrows: usize) -> Result<(), TVError> {
    let ids: Vec<usize> = (0..nrows).collect();

    let names: Vec<String> = ids.iter().map(|i| format!("Student {}", i + 1)).collect();
    let ages: Vec<i32> = ids.iter().map(|i| 18 + (i % 10) as i32).collect();
    let student_ids: Vec<i64> = ids.iter().map(|&i| 1000 + i as i64).collect();
    let weights: Vec<f32> = ids.iter().map(|&i| 50.5 + i as f32 * 0.5).collect();
    let gpas: Vec<f64> = ids.iter().map(|i| 3.0 + (i % 10) as f64 / 10.0).collect();
    let active: Vec<bool> = ids.iter().map(|i| i % 2 == 0).collect();
    let courses: Vec<Series> = ids
        .iter()
        .map(|i| {
            Series::new(
                PlSmallStr::EMPTY,
                [
                    format!("Course {}", i % 5 + 1),
                    format!("Course {}", (i + 2) % 5 + 1),
                ],
            )
        })
        .collect();

    let mut df = DataFrame::new(vec![
        Series::new("name".into(), names).into_column(),
        Series::new("age".into(), ages).into_column(),
        Series::new("id".into(), student_ids).into_column(),
        Series::new("weight".into(), weights).into_column(),
        Series::new("gpa".into(), gpas).into_column(),
        Series::new("active".into(), active).into_column(),
        Series::new("courses".into(), courses).into_column(),
    ])?;

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)?;
    info!("Wrote {nrows} sample rows to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        write_sample(&path, 10).unwrap();

        let df = LazyFrame::scan_parquet(PlPath::Local(path.as_path().into()), ScanArgsParquet::default())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(df.height(), 10);
        assert_eq!(df.width(), 7);
    }

    #[test]
    fn writing_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("sample.parquet");
        assert!(matches!(write_sample(&path, 1), Err(TVError::IoError(_))));
    }
}
