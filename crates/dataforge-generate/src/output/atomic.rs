use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::WriteError;

/// Publish `file_name` in `dir` atomically.
///
/// `fill` writes the content into a hidden staging file, which is flushed,
/// fsynced and hard-linked into place, so an existing file at the final
/// path is never replaced; the directory is fsynced once the staging name
/// is removed. Readers never observe a partial file at the final path.
/// Returns the final path and its size in bytes.
pub fn publish<F>(dir: &Path, file_name: &str, fill: F) -> Result<(PathBuf, u64), WriteError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), WriteError>,
{
    create_dir_all(dir)?;

    let final_path = dir.join(file_name);
    if final_path.exists() {
        return Err(WriteError::Collision(final_path));
    }
    let staging_path = dir.join(format!(".{file_name}.tmp"));

    let result = write_staging(&staging_path, fill).and_then(|()| {
        link_into_place(&staging_path, &final_path)?;
        std::fs::remove_file(&staging_path)?;
        sync_dir(dir)?;
        Ok(())
    });

    if let Err(err) = result {
        let _ = std::fs::remove_file(&staging_path);
        return Err(err);
    }

    let byte_size = std::fs::metadata(&final_path)?.len();
    Ok((final_path, byte_size))
}

fn write_staging<F>(path: &Path, fill: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), WriteError>,
{
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);
    fill(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Link `staging` to `final_path`, failing instead of replacing a file
/// that appeared after the early existence check.
fn link_into_place(staging: &Path, final_path: &Path) -> Result<(), WriteError> {
    match std::fs::hard_link(staging, final_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(WriteError::Collision(final_path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}
