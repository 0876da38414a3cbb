use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};
use crate::error::TransferError;
use crate::packet::Packet;
use crate::transfer::session::TransferSession;
use crate::transfer::TransferSummary;

/// Resolves a requested file name against the directory that is served. Only plain relative names
///  are accepted: nothing can be reached outside `root`.
pub fn resolve_path(root: &Path, filename: &str) -> Result<PathBuf, TransferError> {
    if filename.is_empty() {
        return Err(TransferError::AccessViolation("empty file name".to_string()));
    }

    let relative = Path::new(filename);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TransferError::AccessViolation(format!("{} is outside the served directory", filename)));
            }
        }
    }
    Ok(root.join(relative))
}

/// Sends a local file. `write_request` is `None` when the peer has already asked for the file
///  (server side read), and the WRQ to send for a client side write.
pub async fn send_from_file(session: &mut TransferSession, path: &Path, write_request: Option<Packet>) -> Result<TransferSummary, TransferError> {
    let peer_is_waiting = write_request.is_none();

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            let err = if e.kind() == io::ErrorKind::NotFound {
                TransferError::FileNotFound(path.to_path_buf())
            }
            else {
                TransferError::FileRead { path: path.to_path_buf(), source: e }
            };
            return Err(notify_open_failure(session, peer_is_waiting, err).await);
        }
    };

    let mut reader = BufReader::new(file);
    session.send_file(&mut reader, write_request).await
}

/// Receives into a local file. The data goes to a session-private temporary file next to `path`,
///  which replaces `path` only when the transfer succeeded: concurrent sessions for the same name
///  never touch each other's output, and an existing file stays intact until it is replaced.
///  `opening` is ACK 0 when the peer has already asked to write (server side), and the RRQ for a
///  client side read.
///
/// Nothing is left behind by a transfer that failed before any data arrived. Output of a transfer
///  that failed later is kept under `path` unless `remove_partial_output` is set.
pub async fn receive_into_file(session: &mut TransferSession, path: &Path, opening: Packet, remove_partial_output: bool) -> Result<TransferSummary, TransferError> {
    let peer_is_waiting = matches!(opening, Packet::Ack { .. });

    let (file, temp_path) = match create_temp_output(path) {
        Ok(x) => x,
        Err(e) => {
            let err = TransferError::FileWrite { path: path.to_path_buf(), source: e };
            return Err(notify_open_failure(session, peer_is_waiting, err).await);
        }
    };
    debug!("receiving {:?} into {:?}", path, temp_path);

    let mut writer = BufWriter::new(File::from_std(file));
    let result = session.receive_file(&mut writer, opening).await;
    if result.is_err() {
        if let Err(e) = writer.flush().await {
            debug!("error flushing partial output for {:?}: {}", path, e);
        }
    }
    drop(writer);

    match result {
        Ok(summary) => {
            publish_output(temp_path, path)?;
            Ok(summary)
        }
        Err(e) if session.blocks_transferred() == 0 => {
            discard_output(temp_path);
            Err(TransferError::EmptyTransfer(Box::new(e)))
        }
        Err(e) => {
            if remove_partial_output {
                discard_output(temp_path);
            }
            else if let Err(publish_err) = publish_output(temp_path, path) {
                warn!("error keeping partial output: {}", publish_err);
            }
            Err(e)
        }
    }
}

async fn notify_open_failure(session: &TransferSession, peer_is_waiting: bool, err: TransferError) -> TransferError {
    if peer_is_waiting {
        if let Some(message) = err.message_for_peer() {
            session.send_error(&message).await;
        }
    }
    err
}

/// in the target's directory, so that publishing it is a rename on the same file system
fn create_temp_output(path: &Path) -> io::Result<(std::fs::File, TempPath)> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(NamedTempFile::new_in(dir)?.into_parts())
}

fn publish_output(temp_path: TempPath, path: &Path) -> Result<(), TransferError> {
    temp_path.persist(path)
        .map_err(|e| TransferError::FileWrite { path: path.to_path_buf(), source: e.error })
}

fn discard_output(temp_path: TempPath) {
    debug!("removing output file {:?}", temp_path);
    if let Err(e) = temp_path.close() {
        warn!("error removing output file: {}", e);
    }
}
