//! Service layer: the operations the CLI exposes, written against the
//! [`vector_api::VectorStoreApi`] trait so every one of them runs unchanged
//! against the hosted API or the in-memory stub.

pub mod evaluation;
mod logging;
pub mod questions;
pub mod search;
pub mod store;
pub mod upload;

pub use evaluation::{EvaluationReport, aggregate, evaluate_retrieval, expected_filename};
pub use logging::{init_tracing, init_tracing_with_config};
pub use questions::{QUESTION_PROMPT_PREFIX, generate_question, generate_questions};
pub use search::{llm_integrated_search, vector_search};
pub use store::{create_vector_store, store_info};
pub use upload::{upload_pdf_files_to_vector_store, upload_single_pdf};
