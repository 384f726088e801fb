//! Staging of sample PDFs into a working directory, either downloaded from
//! URLs or copied from local paths.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::file_name_of;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("download of {url} failed: {source}")]
    Download { url: String, source: reqwest::Error },
    #[error("cannot derive a file name from {0}")]
    NoFileName(String),
}

/// Outcome of staging a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Entries in the target directory after staging.
    pub total_in_dir: usize,
}

/// Create `dir` if needed; returns true when it was created.
pub fn ensure_dir(dir: &Path) -> Result<bool, StageError> {
    if dir.exists() {
        return Ok(false);
    }
    fs::create_dir_all(dir).map_err(|source| StageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    info!(dir = %dir.display(), "created directory");
    Ok(true)
}

/// Last path segment of a URL, without query or fragment.
pub fn url_file_name(url: &str) -> Option<String> {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn bar_for(len: Option<u64>, name: &str) -> ProgressBar {
    let bar = match len {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{bar:30}] {binary_bytes}/{binary_total_bytes}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(name.to_string());
    bar
}

/// Stream `url` into `dir`, named `filename` or the URL's last segment.
pub fn download_pdf(
    client: &reqwest::blocking::Client,
    url: &str,
    dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf, StageError> {
    let name = filename
        .map(str::to_string)
        .or_else(|| url_file_name(url))
        .ok_or_else(|| StageError::NoFileName(url.to_string()))?;
    let target = dir.join(&name);

    let download = |source| StageError::Download {
        url: url.to_string(),
        source,
    };
    let mut resp = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(download)?;

    let file = File::create(&target).map_err(|source| StageError::Io {
        path: target.clone(),
        source,
    })?;
    let bar = bar_for(resp.content_length(), &name);
    let copied = resp.copy_to(&mut bar.wrap_write(file));
    bar.finish_and_clear();
    if let Err(err) = copied {
        // Never leave a truncated PDF behind.
        let _ = fs::remove_file(&target);
        return Err(download(err));
    }
    info!(%url, file = %name, "downloaded pdf");
    Ok(target)
}

/// Copy a local PDF into `dir`, keeping its file name.
pub fn copy_pdf(source_path: &Path, dir: &Path) -> Result<PathBuf, StageError> {
    let name = source_path
        .file_name()
        .ok_or_else(|| StageError::NoFileName(source_path.display().to_string()))?;
    let target = dir.join(name);
    fs::copy(source_path, &target).map_err(|source| StageError::Io {
        path: source_path.to_path_buf(),
        source,
    })?;
    info!(file = %file_name_of(source_path), dir = %dir.display(), "copied pdf");
    Ok(target)
}

fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
}

/// Download every URL into `dir`; failures are logged and skipped.
pub fn download_all(
    client: &reqwest::blocking::Client,
    urls: &[String],
    dir: &Path,
) -> Result<StageReport, StageError> {
    ensure_dir(dir)?;
    let mut report = StageReport {
        attempted: urls.len(),
        ..StageReport::default()
    };
    for url in urls {
        match download_pdf(client, url, dir, None) {
            Ok(_) => report.succeeded += 1,
            Err(err) => warn!(%url, error = %err, "download failed"),
        }
    }
    report.total_in_dir = count_entries(dir);
    Ok(report)
}

/// Copy every local path into `dir`; failures are logged and skipped.
pub fn copy_all(paths: &[PathBuf], dir: &Path) -> Result<StageReport, StageError> {
    ensure_dir(dir)?;
    let mut report = StageReport {
        attempted: paths.len(),
        ..StageReport::default()
    };
    for path in paths {
        match copy_pdf(path, dir) {
            Ok(_) => report.succeeded += 1,
            Err(err) => warn!(path = %path.display(), error = %err, "copy failed"),
        }
    }
    report.total_in_dir = count_entries(dir);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    const PDF_BODY: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\n%%EOF\n";

    /// Answer `responses.len()` requests, one connection each, with the raw
    /// response whose path prefix matches the request line.
    fn serve(responses: Vec<(&'static str, Vec<u8>)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let count = responses.len();
        thread::spawn(move || {
            for stream in listener.incoming().take(count) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                        break;
                    }
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let reply = responses
                    .iter()
                    .find(|(prefix, _)| path.starts_with(prefix))
                    .map_or_else(not_found, |(_, raw)| raw.clone());
                let _ = stream.write_all(&reply);
                let _ = stream.flush();
            }
        });
        format!("http://{addr}")
    }

    fn ok_pdf(body: &[u8]) -> Vec<u8> {
        let mut raw = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        raw
    }

    fn not_found() -> Vec<u8> {
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
    }

    fn client() -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap()
    }

    #[test]
    fn download_all_counts_http_errors_as_failures() {
        let base = serve(vec![
            ("/papers/attention.pdf", ok_pdf(PDF_BODY)),
            ("/papers/missing.pdf", not_found()),
        ]);
        let target = tempdir().unwrap();
        let dir = target.path().join("SearchOnThis");
        let urls = vec![
            format!("{base}/papers/attention.pdf?download=1"),
            format!("{base}/papers/missing.pdf"),
        ];

        let report = download_all(&client(), &urls, &dir).unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.total_in_dir, 1);
        assert_eq!(fs::read(dir.join("attention.pdf")).unwrap(), PDF_BODY);
        assert!(!dir.join("missing.pdf").exists());
    }

    #[test]
    fn download_uses_explicit_file_name() {
        let base = serve(vec![("/get", ok_pdf(PDF_BODY))]);
        let dir = tempdir().unwrap();
        let url = format!("{base}/get?id=7");
        let path = download_pdf(&client(), &url, dir.path(), Some("bert.pdf")).unwrap();
        assert_eq!(path, dir.path().join("bert.pdf"));
        assert_eq!(fs::read(&path).unwrap(), PDF_BODY);
    }

    #[test]
    fn truncated_download_leaves_no_file() {
        let mut raw =
            b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n".to_vec();
        raw.extend_from_slice(b"%PDF-1.4 partial");
        let base = serve(vec![("/cut.pdf", raw)]);
        let dir = tempdir().unwrap();

        let url = format!("{base}/cut.pdf");
        let err = download_pdf(&client(), &url, dir.path(), None).unwrap_err();

        assert!(matches!(err, StageError::Download { .. }));
        assert!(!dir.path().join("cut.pdf").exists());
    }

    #[test]
    fn url_names_drop_query_and_fragment() {
        assert_eq!(
            url_file_name("https://example.com/pdf/paper.pdf?dl=1#page=2").as_deref(),
            Some("paper.pdf")
        );
        assert_eq!(url_file_name("https://example.com/dir/"), None);
    }

    #[test]
    fn copy_all_counts_failures_without_aborting() {
        let src = tempdir().unwrap();
        let good = src.path().join("good.pdf");
        fs::write(&good, b"%PDF-1.4").unwrap();
        let missing = src.path().join("missing.pdf");

        let target = tempdir().unwrap();
        let dir = target.path().join("SearchOnThis");
        let report = copy_all(&[good, missing], &dir).unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.total_in_dir, 1);
        assert!(dir.join("good.pdf").exists());
    }

    #[test]
    fn ensure_dir_reports_creation_once() {
        let root = tempdir().unwrap();
        let dir = root.path().join("a").join("b");
        assert!(ensure_dir(&dir).unwrap());
        assert!(!ensure_dir(&dir).unwrap());
    }
}
