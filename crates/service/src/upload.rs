use anyhow::{Context, Result};
use content_extractor::{file_name_of, list_pdfs};
use core_types::{UploadOutcome, UploadStats};
use scheduler::WorkerPool;
use std::path::Path;
use tracing::{info, warn};
use vector_api::{FilePurpose, VectorStoreApi};

/// Upload one PDF and attach it to the store.
///
/// Never fails: any error from either call is captured in the outcome.
pub fn upload_single_pdf(api: &dyn VectorStoreApi, path: &Path, store_id: &str) -> UploadOutcome {
    let name = file_name_of(path);
    let attached = api
        .upload_file(path, FilePurpose::Assistants)
        .and_then(|file| api.attach_file(store_id, &file.id));
    match attached {
        Ok(_) => UploadOutcome::success(name),
        Err(err) => {
            warn!(file = %name, error = %err, "upload failed");
            UploadOutcome::failed(name, err.to_string())
        }
    }
}

/// Upload every PDF directly inside `dir` through the worker pool.
pub fn upload_pdf_files_to_vector_store(
    api: &dyn VectorStoreApi,
    pool: &WorkerPool,
    store_id: &str,
    dir: &Path,
) -> Result<UploadStats> {
    let pdfs = list_pdfs(dir).with_context(|| format!("listing PDFs in {}", dir.display()))?;
    info!(
        count = pdfs.len(),
        workers = pool.workers(),
        "uploading PDF files in parallel"
    );

    let mut stats = UploadStats::new(pdfs.len());
    let outcomes = pool.run("uploading", pdfs, |path| {
        upload_single_pdf(api, &path, store_id)
    });
    for outcome in outcomes {
        stats.record(outcome);
    }
    info!(
        total = stats.total_files,
        ok = stats.successful_uploads,
        failed = stats.failed_uploads,
        "upload finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::UploadStatus;
    use scheduler::Progress;
    use std::fs;
    use tempfile::tempdir;
    use vector_api::StubApi;

    fn pool() -> WorkerPool {
        WorkerPool::new(4).unwrap().with_progress(Progress::Hidden)
    }

    #[test]
    fn stats_add_up_with_one_failure() {
        let dir = tempdir().unwrap();
        for name in ["a.pdf", "b.pdf", "c.PDF", "skip.txt"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let api = StubApi::new().with_failing_upload("b.pdf");
        let store = api.create_vector_store("docs").unwrap();

        let stats = upload_pdf_files_to_vector_store(&api, &pool(), &store.id, dir.path()).unwrap();

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.successful_uploads, 2);
        assert_eq!(stats.failed_uploads, 1);
        assert_eq!(
            stats.successful_uploads + stats.failed_uploads,
            stats.total_files
        );
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].file, "b.pdf");
        assert_eq!(stats.errors[0].status, UploadStatus::Failed);

        let mut attached = api.attached_filenames(&store.id);
        attached.sort();
        assert_eq!(attached, vec!["a.pdf", "c.PDF"]);
    }

    #[test]
    fn empty_dir_uploads_nothing() {
        let dir = tempdir().unwrap();
        let api = StubApi::new();
        let store = api.create_vector_store("docs").unwrap();
        let stats = upload_pdf_files_to_vector_store(&api, &pool(), &store.id, dir.path()).unwrap();
        assert_eq!(stats, UploadStats::new(0));
        assert_eq!(api.call_count("upload_file"), 0);
    }

    #[test]
    fn attach_to_missing_store_is_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        fs::write(&path, b"alpha").unwrap();
        let outcome = upload_single_pdf(&StubApi::new(), &path, "vs_nope");
        assert!(!outcome.is_success());
        assert!(outcome.error.unwrap().contains("vs_nope"));
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let api = StubApi::new();
        let res = upload_pdf_files_to_vector_store(&api, &pool(), "vs_1", &dir.path().join("nope"));
        assert!(res.is_err());
    }
}
