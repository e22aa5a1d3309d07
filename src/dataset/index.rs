//! Sample indexing.
//!
//! Two index shapes exist. Train and validation partitions come from CSV
//! files with `path,label` rows; the held-out test partition is a directory
//! tree `root/<group>/<class>/<image>` covering five collection sites.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataset::{Mode, Sample};
use crate::error::{Result, UsplaneError};

/// Collection sites that make up the held-out test partition.
pub const TEST_GROUPS: [&str; 5] = ["白银", "佛山市一", "广医附三", "湖南省妇幼", "岭南迈瑞"];

#[derive(Debug, Deserialize)]
struct IndexRow {
    path: String,
    label: String,
}

/// Reads a `path,label` CSV index. Rows whose label is not in the mode's
/// dictionary abort indexing with the offending string.
pub fn csv_index(csv_path: &Path, mode: Mode) -> Result<Vec<Sample>> {
    let mut reader =
        csv::Reader::from_path(csv_path).map_err(|e| UsplaneError::DataAccess {
            path: csv_path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let row: IndexRow = row?;
        let label = mode.label_of(&row.label).ok_or_else(|| UsplaneError::UnknownLabel {
            label: row.label.clone(),
            mode: mode.to_string(),
            index: csv_path.to_path_buf(),
        })?;
        samples.push(Sample {
            path: PathBuf::from(row.path),
            label,
        });
    }
    Ok(samples)
}

/// Walks `root/<group>/<class>/` for every test group and both classes of
/// the mode. Listings are sorted so the sample order is stable across
/// filesystems. A missing group or class directory aborts indexing.
pub fn directory_index(root: &Path, mode: Mode) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();
    for group in TEST_GROUPS {
        for (class_name, label) in mode.class_dict() {
            let class_dir = root.join(group).join(class_name);
            let mut paths = list_files(&class_dir)?;
            paths.sort();
            samples.extend(paths.into_iter().map(|path| Sample { path, label }));
        }
    }
    Ok(samples)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| UsplaneError::DataAccess {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UsplaneError::DataAccess {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.path().is_file() {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_index_maps_resting_labels() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "train.csv",
            "path,label\n\
             a.png,1.静息-标准\n\
             b.png,1.静息-标准\n\
             c.png,2.静息-非标准\n\
             d.png,2.静息-非标准\n",
        );

        let samples = csv_index(&csv, Mode::J).unwrap();
        let labels: Vec<usize> = samples.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![0, 0, 1, 1]);
        assert_eq!(samples[0].path, PathBuf::from("a.png"));
    }

    #[test]
    fn csv_index_rejects_foreign_mode_labels() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), "train.csv", "path,label\na.png,3.Valsalva-标准\n");

        let err = csv_index(&csv, Mode::J).unwrap_err();
        match err {
            UsplaneError::UnknownLabel { label, mode, .. } => {
                assert_eq!(label, "3.Valsalva-标准");
                assert_eq!(mode, "J");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn csv_index_missing_file_is_data_access() {
        let err = csv_index(Path::new("/nonexistent/train.csv"), Mode::J).unwrap_err();
        assert!(matches!(err, UsplaneError::DataAccess { .. }));
    }

    #[test]
    fn directory_index_walks_all_groups_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for group in TEST_GROUPS {
            for (class_name, _) in Mode::J.class_dict() {
                let class_dir = dir.path().join(group).join(class_name);
                fs::create_dir_all(&class_dir).unwrap();
                // Deliberately created out of order.
                fs::File::create(class_dir.join("b.png")).unwrap();
                fs::File::create(class_dir.join("a.png")).unwrap();
            }
        }

        let samples = directory_index(dir.path(), Mode::J).unwrap();
        assert_eq!(samples.len(), TEST_GROUPS.len() * 2 * 2);
        // Within each class directory, files come out sorted.
        assert!(samples[0].path.ends_with("a.png"));
        assert!(samples[1].path.ends_with("b.png"));
        assert_eq!(samples[0].label, 0);
        assert_eq!(samples[2].label, 1);
    }

    #[test]
    fn directory_index_missing_group_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = directory_index(dir.path(), Mode::J).unwrap_err();
        assert!(matches!(err, UsplaneError::DataAccess { .. }));
    }
}
