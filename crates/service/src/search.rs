use anyhow::{Context, Result, anyhow};
use core_types::{LlmSearchResult, SearchHit};
use indexmap::IndexSet;
use tracing::debug;
use vector_api::{ResponseRequest, SearchRequest, VectorStoreApi};

/// Direct similarity search; hits come back in the store's ranking order.
pub fn vector_search(
    api: &dyn VectorStoreApi,
    store_id: &str,
    query: &str,
    max_results: Option<u32>,
) -> Result<Vec<SearchHit>> {
    let req = SearchRequest {
        query: query.to_string(),
        max_num_results: max_results,
    };
    let page = api
        .search(store_id, &req)
        .with_context(|| format!("searching vector store {store_id}"))?;
    debug!(hits = page.data.len(), has_more = page.has_more, "search done");
    Ok(page.data.into_iter().map(SearchHit::from).collect())
}

/// Ask `model` to answer `query` with the file_search tool over the store.
pub fn llm_integrated_search(
    api: &dyn VectorStoreApi,
    store_id: &str,
    query: &str,
    model: &str,
    max_results: u32,
) -> Result<LlmSearchResult> {
    let req = ResponseRequest::file_search(model, query, store_id, Some(max_results));
    let resp = api.create_response(&req).context("LLM integrated search")?;

    let (text, _) = resp
        .first_output_text()
        .ok_or_else(|| anyhow!("response {} carried no message text", resp.id))?;
    let files_used: IndexSet<String> = resp
        .cited_filenames()
        .unwrap_or_default()
        .into_iter()
        .collect();

    Ok(LlmSearchResult {
        files_used: files_used.into_iter().collect(),
        response: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_api::StubApi;

    fn seeded() -> (StubApi, String) {
        let api = StubApi::new()
            .with_answer("Transformers rely on attention.")
            .with_citations(
                "what is attention",
                &["attention.pdf", "bert.pdf", "attention.pdf"],
            );
        let store = api.seed_store(
            "papers",
            &[
                (
                    "attention.pdf",
                    vec!["attention is all you need".into(), "multi head attention".into()],
                ),
                ("bert.pdf", vec!["bidirectional encoders".into()]),
            ],
        );
        (api, store)
    }

    #[test]
    fn vector_search_maps_hits_in_rank_order() {
        let (api, store) = seeded();
        let hits = vector_search(&api, &store, "multi head attention", Some(5)).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].filename, "attention.pdf");
        assert_eq!(hits[0].content[0], "multi head attention");
        assert_eq!(hits[0].content_len(), "multi head attention".len());
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn llm_search_dedups_files_in_first_seen_order() {
        let (api, store) = seeded();
        let result =
            llm_integrated_search(&api, &store, "what is attention", "gpt-4o-mini", 10).unwrap();
        assert_eq!(result.files_used, vec!["attention.pdf", "bert.pdf"]);
        assert_eq!(result.response, "Transformers rely on attention.");
    }

    #[test]
    fn llm_search_failure_propagates() {
        let api = StubApi::new().with_failing_input("boom");
        let err = llm_integrated_search(&api, "vs_1", "boom", "gpt-4o-mini", 10).unwrap_err();
        assert!(format!("{err:#}").contains("500"));
    }
}
