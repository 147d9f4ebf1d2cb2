use std::io::SeekFrom;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Moves from the current position to the beginning of the line that ends there, and returns the
/// new position. A newline right before the current position is treated as the terminator of that
/// line, so repeated calls walk the file one line at a time.
///
/// `buffer` is only scratch space for scanning backwards. An empty one is rejected with
/// [io::ErrorKind::InvalidInput] and the position is left untouched.
pub async fn seek_last_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<u64, io::Error> {
    if buffer.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Scan buffer must not be empty",
        ));
    }
    let end = file.stream_position().await?;

    let mut scan_end = end.saturating_sub(1);
    while scan_end > 0 {
        let chunk_len = u64::min(scan_end, buffer.len() as u64);
        let chunk_start = scan_end - chunk_len;
        file.seek(SeekFrom::Start(chunk_start)).await?;

        let chunk = &mut buffer[..chunk_len as usize];
        file.read_exact(chunk).await?;
        if let Some(index) = chunk.iter().rposition(|v| *v == b'\n') {
            return file
                .seek(SeekFrom::Start(chunk_start + index as u64 + 1))
                .await;
        }
        scan_end = chunk_start;
    }

    file.seek(SeekFrom::Start(0)).await
}
