use anyhow::{Context, Result, anyhow};
use content_extractor::{ExtractContext, Extractor, file_name_of, list_pdfs};
use core_types::Questions;
use std::path::Path;
use tracing::{info, warn};
use vector_api::{ResponseRequest, VectorStoreApi};

pub const QUESTION_PROMPT_PREFIX: &str =
    "Can you generate a question that can only be answered from this document?:\n";

pub fn question_prompt(text: &str) -> String {
    format!("{QUESTION_PROMPT_PREFIX}{text}\n\n")
}

/// Ask `model` for one question answerable only from the PDF at `path`.
pub fn generate_question(
    api: &dyn VectorStoreApi,
    extractor: &dyn Extractor,
    path: &Path,
    model: &str,
    max_chars: Option<usize>,
) -> Result<String> {
    let extracted = extractor
        .extract(&ExtractContext::new(path).with_max_chars(max_chars))
        .with_context(|| format!("extracting text from {}", path.display()))?;
    if extracted.truncated {
        info!(path = %path.display(), max_chars, "document text truncated for prompt");
    }

    let resp = api
        .create_response(&ResponseRequest::text(model, question_prompt(&extracted.text)))
        .with_context(|| format!("generating question for {}", path.display()))?;
    resp.message_text()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| anyhow!("model returned no question for {}", path.display()))
}

/// One question per PDF in `dir`, keyed by file name in directory order.
///
/// Files whose extraction or generation fails are skipped with a warning.
pub fn generate_questions(
    api: &dyn VectorStoreApi,
    extractor: &dyn Extractor,
    dir: &Path,
    model: &str,
    max_chars: Option<usize>,
) -> Result<Questions> {
    let pdfs = list_pdfs(dir).with_context(|| format!("listing PDFs in {}", dir.display()))?;
    let mut questions = Questions::with_capacity(pdfs.len());
    for path in &pdfs {
        let name = file_name_of(path);
        match generate_question(api, extractor, path, model, max_chars) {
            Ok(question) => {
                info!(file = %name, "question generated");
                questions.insert(name, question);
            }
            Err(err) => warn!(file = %name, error = %format!("{err:#}"), "skipping file"),
        }
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_extractor::{ExtractError, ExtractedContent, enforce_limits_str};
    use std::fs;
    use tempfile::tempdir;
    use vector_api::StubApi;

    /// Reads files as UTF-8 so tests need no real PDFs.
    struct PlainText;

    impl Extractor for PlainText {
        fn name(&self) -> &'static str {
            "plain"
        }

        fn supports(&self, _ctx: &ExtractContext<'_>) -> bool {
            true
        }

        fn extract(&self, ctx: &ExtractContext<'_>) -> Result<ExtractedContent, ExtractError> {
            let mut text = fs::read_to_string(ctx.path)?;
            if text.contains("CORRUPT") {
                return Err(ExtractError::Failed("corrupt".into()));
            }
            let truncated = enforce_limits_str(&mut text, ctx.max_chars);
            Ok(ExtractedContent {
                path: ctx.path.to_path_buf(),
                text,
                truncated,
            })
        }
    }

    #[test]
    fn prompt_wraps_document_text() {
        assert_eq!(
            question_prompt("body"),
            "Can you generate a question that can only be answered from this document?:\nbody\n\n"
        );
    }

    #[test]
    fn questions_keyed_by_filename_and_failures_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), "alpha text").unwrap();
        fs::write(dir.path().join("b.pdf"), "CORRUPT").unwrap();
        fs::write(dir.path().join("c.pdf"), "gamma text").unwrap();

        let api = StubApi::new()
            .with_answer("  What is alpha?  ")
            .with_failing_input(&question_prompt("gamma text"));
        let questions = generate_questions(&api, &PlainText, dir.path(), "gpt-4o", None).unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions.get("a.pdf").map(String::as_str), Some("What is alpha?"));
        assert_eq!(api.call_count("create_response"), 2);
    }

    #[test]
    fn max_chars_caps_the_prompt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.pdf");
        fs::write(&path, "abcdefghij").unwrap();

        // Only the truncated prompt is scripted to fail, so failure proves the cap.
        let api = StubApi::new().with_failing_input(&question_prompt("abcd"));
        assert!(generate_question(&api, &PlainText, &path, "gpt-4o", Some(4)).is_err());
        assert!(generate_question(&api, &PlainText, &path, "gpt-4o", None).is_ok());
    }
}
