use anyhow::{Context, Result};
use core_types::StoreDetails;
use tracing::info;
use vector_api::VectorStoreApi;

pub fn create_vector_store(api: &dyn VectorStoreApi, name: &str) -> Result<StoreDetails> {
    let store = api
        .create_vector_store(name)
        .with_context(|| format!("creating vector store {name:?}"))?;
    let details = store.details();
    info!(id = %details.id, name = %details.name, "vector store created");
    Ok(details)
}

pub fn store_info(api: &dyn VectorStoreApi, store_id: &str) -> Result<StoreDetails> {
    let store = api
        .retrieve_vector_store(store_id)
        .with_context(|| format!("retrieving vector store {store_id}"))?;
    Ok(store.details())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_api::StubApi;

    #[test]
    fn created_store_starts_empty() {
        let api = StubApi::new();
        let details = create_vector_store(&api, "papers").unwrap();
        assert_eq!(details.name, "papers");
        assert_eq!(details.file_count, 0);

        let again = store_info(&api, &details.id).unwrap();
        assert_eq!(again, details);
    }

    #[test]
    fn unknown_store_is_an_error() {
        let api = StubApi::new();
        let err = store_info(&api, "vs_missing").unwrap_err();
        assert!(format!("{err:#}").contains("vs_missing"));
    }
}
