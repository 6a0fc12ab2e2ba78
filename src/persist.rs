//! Durable outputs: atomic file staging and the pickled scaler artifact.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

use serde_pickle::{DeOptions, SerOptions};
use tempfile::{NamedTempFile, TempPath};

use crate::error::{NormalizeError, Result};
use crate::scalers::ScalerParameters;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Opens a temporary file next to `dest`, creating missing directories.
///
/// Nothing is visible at `dest` until [`commit`] renames the file over it.
pub fn stage(dest: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(dest);
    fs_extra::dir::create_all(dir, false).map_err(|source| NormalizeError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    NamedTempFile::new_in(dir).map_err(|e| NormalizeError::io(dir, e))
}

// Temp files are created 0600; outputs get the usual rw-r--r--.
#[cfg(unix)]
fn publish_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn publish_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}

pub fn commit(staged: NamedTempFile, dest: &Path) -> Result<()> {
    publish_permissions(staged.as_file()).map_err(|e| NormalizeError::io(dest, e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| NormalizeError::io(dest, e))?;
    staged
        .persist(dest)
        .map_err(|e| NormalizeError::io(dest, e.error))?;
    log::debug!("Committed {}", dest.display());
    Ok(())
}

/// Commits every staged file, or none of them.
///
/// A file already at a destination is moved aside first and put back if a
/// later commit fails.
pub fn commit_all(staged: Vec<(NamedTempFile, &Path)>) -> Result<()> {
    let mut committed = Vec::with_capacity(staged.len());
    for (file, dest) in staged {
        let step = set_aside(dest).and_then(|previous| match commit(file, dest) {
            Ok(()) => Ok(previous),
            Err(e) => {
                roll_back(dest, previous, false);
                Err(e)
            }
        });
        match step {
            Ok(previous) => committed.push((dest, previous)),
            Err(e) => {
                for (dest, previous) in committed.into_iter().rev() {
                    roll_back(dest, previous, true);
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

fn set_aside(dest: &Path) -> Result<Option<TempPath>> {
    if !dest.is_file() {
        return Ok(None);
    }
    let dir = parent_dir(dest);
    let backup = NamedTempFile::new_in(dir)
        .map_err(|e| NormalizeError::io(dir, e))?
        .into_temp_path();
    fs::rename(dest, &backup).map_err(|e| NormalizeError::io(dest, e))?;
    Ok(Some(backup))
}

fn roll_back(dest: &Path, previous: Option<TempPath>, remove_current: bool) {
    if remove_current {
        if let Err(e) = fs::remove_file(dest) {
            log::warn!("Could not remove {}: {e}", dest.display());
        }
    }
    if let Some(backup) = previous {
        if let Err(e) = backup.persist(dest) {
            log::warn!("Could not restore {}: {}", dest.display(), e.error);
        }
    }
}

pub fn write_params<W: Write>(params: &ScalerParameters, mut writer: W) -> Result<()> {
    serde_pickle::to_writer(&mut writer, params, SerOptions::new())?;
    Ok(())
}

/// Writes `params` to `path` as a pickle, atomically.
pub fn save_params(params: &ScalerParameters, path: &Path) -> Result<()> {
    let mut staged = stage(path)?;
    write_params(params, &mut staged)?;
    commit(staged, path)?;
    log::info!("Saved scaler parameters to {}", path.display());
    Ok(())
}

pub fn load_params(path: &Path) -> Result<ScalerParameters> {
    let file = File::open(path).map_err(|e| NormalizeError::io(path, e))?;
    let params = serde_pickle::from_reader(BufReader::new(file), DeOptions::new())?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalers::{ColumnStats, Ddof};
    use std::collections::BTreeMap;

    fn sample_params() -> ScalerParameters {
        let mut columns = BTreeMap::new();
        columns.insert(
            "cpu_usage".to_owned(),
            ColumnStats {
                mean: 25.0,
                std_dev: 12.909944487358056,
                n_samples: 4,
            },
        );
        columns.insert(
            "energy_efficiency".to_owned(),
            ColumnStats {
                mean: 0.1 + 0.2,
                std_dev: std::f64::consts::PI / 7.0,
                n_samples: 4,
            },
        );
        ScalerParameters {
            ddof: Ddof::Sample.delta(),
            columns,
        }
    }

    #[test]
    fn test_params_reload_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.pkl");
        let params = sample_params();

        save_params(&params, &path).unwrap();
        let loaded = load_params(&path).unwrap();

        assert_eq!(loaded, params);
        let cpu = &loaded.columns["cpu_usage"];
        assert_eq!(cpu.std_dev.to_bits(), 12.909944487358056_f64.to_bits());
    }

    #[test]
    fn test_save_params_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("v1").join("scaler.pkl");
        save_params(&sample_params(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_stage_leaves_nothing_without_commit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        {
            let mut staged = stage(&dest).unwrap();
            staged.write_all(b"partial").unwrap();
        }
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_load_params_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.pkl");
        std::fs::write(&path, b"not a pickle").unwrap();
        assert!(matches!(
            load_params(&path),
            Err(NormalizeError::Serialization(_))
        ));
    }

    #[test]
    fn test_load_params_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_params(&dir.path().join("absent.pkl")),
            Err(NormalizeError::Io { .. })
        ));
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("scaler.pkl")), Path::new("."));
        assert_eq!(parent_dir(Path::new("out/data.csv")), Path::new("out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_committed_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.pkl");
        save_params(&sample_params(), &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644, "mode was {mode:o}");
    }

    #[test]
    fn test_commit_all_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("out").join("b.pkl");
        fs::write(&a, "old").unwrap();

        let mut staged_a = stage(&a).unwrap();
        staged_a.write_all(b"new a").unwrap();
        let mut staged_b = stage(&b).unwrap();
        staged_b.write_all(b"new b").unwrap();

        commit_all(vec![(staged_a, a.as_path()), (staged_b, b.as_path())]).unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "new a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "new b");
        // no backups left next to the outputs
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_commit_all_rolls_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("fresh.csv");
        let existing = dir.path().join("existing.csv");
        let blocked = dir.path().join("blocked");
        fs::write(&existing, "previous run").unwrap();
        fs::create_dir(&blocked).unwrap();

        let mut staged_fresh = stage(&fresh).unwrap();
        staged_fresh.write_all(b"fresh").unwrap();
        let mut staged_existing = stage(&existing).unwrap();
        staged_existing.write_all(b"replacement").unwrap();
        let staged_blocked = stage(&blocked).unwrap();

        let result = commit_all(vec![
            (staged_fresh, fresh.as_path()),
            (staged_existing, existing.as_path()),
            (staged_blocked, blocked.as_path()),
        ]);

        assert!(matches!(result, Err(NormalizeError::Io { .. })));
        assert!(!fresh.exists());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "previous run");
        assert!(blocked.is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
