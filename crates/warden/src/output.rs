use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Forward a child output stream line by line into our own log. IO errors
/// here never reach the supervision loop; a broken pipe just ends the task.
pub async fn forward<R: AsyncRead + Unpin>(reader: R, pid: u32, stream: &'static str) {
	let mut lines = BufReader::new(reader).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => tracing::info!(target: "server", "[{}] {}", pid, line),
			Ok(None) => break,
			Err(e) => {
				tracing::debug!("{} pipe for pid {} closed: {}", stream, pid, e);
				break;
			}
		}
	}
}
