//! Streaming a finished package to disk.

use crate::error::ApiError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// File name to write a package under, or `None` if the server name would
/// escape the destination directory.
pub(crate) fn package_file_name(filename: &str) -> Option<&str> {
    let name = Path::new(filename).file_name()?.to_str()?;
    (name == filename && !name.is_empty()).then_some(name)
}

/// Write a byte stream to `dest` through a `.part` file, renamed on success.
pub(crate) async fn write_stream<S, E>(dest: &Path, stream: S) -> Result<u64, ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let io_err = |path: &Path, source: std::io::Error| ApiError::Io {
        path: path.to_path_buf(),
        source,
    };

    let part = dest.with_file_name(format!(
        "{}.part",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    let mut file = tokio::fs::File::create(&part)
        .await
        .map_err(|e| io_err(&part, e))?;

    futures::pin_mut!(stream);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&part).await;
                return Err(io_err(dest, std::io::Error::other(e)));
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| io_err(&part, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| io_err(&part, e))?;
    drop(file);

    tokio::fs::rename(&part, dest)
        .await
        .map_err(|e| io_err(dest, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn package_names_must_be_plain() {
        assert_eq!(package_file_name("t1.zip"), Some("t1.zip"));
        assert_eq!(package_file_name("../t1.zip"), None);
        assert_eq!(package_file_name("/etc/passwd"), None);
        assert_eq!(package_file_name(""), None);
    }

    #[tokio::test]
    async fn stream_is_written_then_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t1.zip");
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"PK\x03\x04")),
            Ok(Bytes::from_static(b"stems")),
        ];

        let written = write_stream(&dest, stream::iter(chunks)).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"PK\x03\x04stems");
        assert!(!dir.path().join("t1.zip.part").exists());
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t1.zip");
        let chunks = vec![
            Ok(Bytes::from_static(b"PK")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        ];

        let err = write_stream(&dest, stream::iter(chunks)).await.unwrap_err();

        assert!(matches!(err, ApiError::Io { .. }));
        assert!(!dest.exists());
        assert!(!dir.path().join("t1.zip.part").exists());
    }
}
