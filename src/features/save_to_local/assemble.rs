//! Reassembly of part files into the output file.
use tracing::{debug, info, warn};

use crate::shared::errors::CliantError;
use crate::shared::fs::LocalFs;

/// Concatenates `parts` into `output_name`, strictly in the order given.
///
/// Each part is read whole and appended. Any read or write failure is an
/// [`CliantError::Assembly`] naming the part. Returns the bytes written.
pub async fn reassemble(store: &LocalFs, output_name: &str, parts: &[String]) -> Result<u64, CliantError> {
    let mut output = store.create(output_name).await?;
    for part in parts {
        let part_path = store.path_of(part);
        let buffer = store
            .read(part)
            .await
            .map_err(|err| CliantError::assembly(&part_path, err))?;
        debug!(part = %part, bytes = buffer.len(), "Appending part.");
        output.append_bytes(buffer).await.map_err(|err| match err {
            CliantError::Filesystem { source, .. } => CliantError::Assembly { part: part_path.clone(), source },
            other => other,
        })?;
    }
    let written = output.close_fs().await?;
    info!(parts = parts.len(), written, output = output_name, "Reassembled output file.");
    Ok(written)
}

/// Deletes every part file; missing files are skipped.
pub async fn remove_parts(store: &LocalFs, parts: &[String]) {
    for part in parts {
        if let Err(err) = store.remove(part).await {
            warn!(error = %err, "Can't remove part file {part}.");
        }
    }
    debug!(parts = parts.len(), "Removed part files.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_parts(dir: &std::path::Path, parts: &[(&str, &[u8])]) {
        for (name, content) in parts {
            std::fs::write(dir.join(name), content).expect("write part");
        }
    }

    #[tokio::test]
    async fn test_reassemble_in_given_order() -> Result<(), CliantError> {
        let dir = tempfile::tempdir().map_err(|e| CliantError::Fatal(e.to_string()))?;
        // written out of order on purpose
        write_parts(dir.path(), &[("out-2", b"ghi"), ("out-0", b"abc"), ("out-1", b"def")]);
        let store = LocalFs::new(dir.path())?;
        let parts: Vec<String> = (0..3).map(|i| format!("out-{i}")).collect();

        let written = reassemble(&store, "out", &parts).await?;
        assert_eq!(written, 9);
        assert_eq!(std::fs::read(dir.path().join("out")).ok(), Some(b"abcdefghi".to_vec()));

        remove_parts(&store, &parts).await;
        for part in &parts {
            assert!(!dir.path().join(part).exists());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_part_names_the_part() -> Result<(), CliantError> {
        let dir = tempfile::tempdir().map_err(|e| CliantError::Fatal(e.to_string()))?;
        write_parts(dir.path(), &[("out-0", b"abc")]);
        let store = LocalFs::new(dir.path())?;
        let parts = vec!["out-0".to_string(), "out-1".to_string()];

        match reassemble(&store, "out", &parts).await {
            Err(CliantError::Assembly { part, .. }) => assert_eq!(part, dir.path().join("out-1")),
            other => panic!("expected assembly error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_parts_tolerates_missing_files() -> Result<(), CliantError> {
        let dir = tempfile::tempdir().map_err(|e| CliantError::Fatal(e.to_string()))?;
        write_parts(dir.path(), &[("out-1", b"x")]);
        let store = LocalFs::new(dir.path())?;
        remove_parts(&store, &["out-0".to_string(), "out-1".to_string()]).await;
        assert!(!dir.path().join("out-1").exists());
        Ok(())
    }
}
