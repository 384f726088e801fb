use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cli::{hit_lines, metrics_lines, projection_summary, store_lines, upload_summary};
use console::style;
use content_extractor::{PdfExtractor, staging};
use core_types::UploadStats;
use core_types::config::{AppConfig, load_or_create_config};
use projection::{Pipeline, cluster_counts};
use scheduler::WorkerPool;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use vector_api::OpenAiClient;
use viewer::ViewerState;

/// Upload, search, evaluate and visualize OpenAI vector stores.
#[derive(Parser, Debug)]
#[command(name = "storelens", version = cli::VERSION, about = "Vector store tools")]
struct Cli {
    /// API key; falls back to the config file, then OPENAI_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Load environment variables from this file instead of ./.env.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// TOML config file; created with defaults when missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// -v for debug logs, -vv for trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a vector store and save its details.
    Create {
        #[arg(long)]
        store_name: String,
        #[arg(long, default_value = "vector_store_details.json")]
        output: PathBuf,
    },
    /// Show a vector store's details.
    Info {
        #[arg(long)]
        store_id: String,
    },
    /// Upload every PDF in a directory to a vector store.
    Upload {
        #[arg(long)]
        store_id: String,
        #[arg(long)]
        pdf_dir: PathBuf,
        #[arg(long, default_value = "upload_stats.json")]
        upload_stats: PathBuf,
        /// Concurrent uploads (defaults to the config value).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Semantic search against a vector store.
    Search {
        #[arg(long)]
        store_id: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Answer a query with a model using the file_search tool.
    LlmSearch {
        #[arg(long)]
        store_id: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value_t = 10)]
        max_results: u32,
    },
    /// Generate one question per PDF for retrieval evaluation.
    GenerateQuestions {
        #[arg(long)]
        pdf_dir: PathBuf,
        #[arg(long, default_value = "generated_questions.json")]
        output: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
    /// Score retrieval of generated questions against a vector store.
    Evaluate {
        #[arg(long)]
        store_id: String,
        #[arg(long, default_value = "generated_questions.json")]
        questions: PathBuf,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        model: Option<String>,
        /// Where to save the metrics JSON.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Project a vector store's embeddings to 3D and cluster them.
    Visualize {
        #[arg(long)]
        store_id: String,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long, default_value = "vector_store_visualization.html")]
        output: PathBuf,
        /// Start the interactive viewer after writing the HTML file.
        #[arg(long)]
        serve: bool,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create a store, upload a directory of PDFs, then visualize it.
    CreateAndVisualize {
        #[arg(long)]
        store_name: String,
        #[arg(long)]
        pdf_dir: PathBuf,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long, default_value = "vector_store_visualization.html")]
        output: PathBuf,
        #[arg(long, default_value = "upload_stats.json")]
        upload_stats: PathBuf,
        #[arg(long)]
        serve: bool,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Gather sample PDFs into a directory.
    StagePdfs {
        #[arg(long, default_value = "SearchOnThis")]
        target_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = SourceArg::Copy)]
        source: SourceArg,
        /// Local PDF paths (with --source copy).
        #[arg(long, num_args = 1..)]
        local_pdfs: Vec<PathBuf>,
        /// PDF URLs (with --source download).
        #[arg(long, num_args = 1..)]
        urls: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    Download,
    Copy,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("loading env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut cfg = load_or_create_config(cli.config.as_deref()).context("loading config")?;
    match cli.verbose {
        0 => {}
        1 => cfg.logging.level = "debug".into(),
        _ => cfg.logging.level = "trace".into(),
    }
    let _guard = service::init_tracing_with_config(&cfg.logging)?;

    let key = cli.api_key.as_deref();
    match cli.command {
        Commands::Create { store_name, output } => {
            let api = connect(&cfg, key)?;
            let details = service::create_vector_store(&api, &store_name)?;
            print_lines(&store_lines(&details));
            save_json(&output, &details, "Vector store details")?;
        }
        Commands::Info { store_id } => {
            let api = connect(&cfg, key)?;
            let details = service::store_info(&api, &store_id)?;
            print_lines(&store_lines(&details));
        }
        Commands::Upload {
            store_id,
            pdf_dir,
            upload_stats,
            workers,
        } => {
            let api = connect(&cfg, key)?;
            let pool = WorkerPool::new(workers.unwrap_or(cfg.upload.workers))?;
            let stats = service::upload_pdf_files_to_vector_store(&api, &pool, &store_id, &pdf_dir)?;
            report_upload(&stats, &upload_stats)?;
        }
        Commands::Search {
            store_id,
            query,
            max_results,
        } => {
            let api = connect(&cfg, key)?;
            let hits = service::vector_search(&api, &store_id, &query, max_results)?;
            println!(
                "{} {}",
                style(format!("Search results for: {query}")).cyan().bold(),
                style(format!("({} hits)", hits.len())).dim()
            );
            for (i, hit) in hits.iter().enumerate() {
                print_lines(&hit_lines(i, hit));
            }
        }
        Commands::LlmSearch {
            store_id,
            query,
            model,
            max_results,
        } => {
            let api = connect(&cfg, key)?;
            let model = model.unwrap_or_else(|| cfg.models.search_model.clone());
            let result = service::llm_integrated_search(&api, &store_id, &query, &model, max_results)?;
            println!("{}", style("Files used:").cyan().bold());
            for name in &result.files_used {
                println!("  {name}");
            }
            println!("{}", style("Response:").cyan().bold());
            println!("{}", result.response);
        }
        Commands::GenerateQuestions {
            pdf_dir,
            output,
            model,
        } => {
            let api = connect(&cfg, key)?;
            let model = model.unwrap_or_else(|| cfg.models.question_model.clone());
            let questions = service::generate_questions(
                &api,
                &PdfExtractor::new(),
                &pdf_dir,
                &model,
                cfg.evaluation.question_max_chars,
            )?;
            println!(
                "{}",
                style(format!("Generated {} questions", questions.len())).green()
            );
            save_json(&output, &questions, "Questions")?;
        }
        Commands::Evaluate {
            store_id,
            questions,
            k,
            model,
            output,
            workers,
        } => {
            let api = connect(&cfg, key)?;
            let questions = core_serialization::read_questions(&questions)?;
            let pool = WorkerPool::new(workers.unwrap_or(cfg.evaluation.workers))?;
            let k = k.unwrap_or(cfg.evaluation.k);
            if k == 0 {
                bail!("--k must be at least 1");
            }
            let model = model.unwrap_or_else(|| cfg.models.search_model.clone());
            let report =
                service::evaluate_retrieval(&api, &pool, &store_id, &questions, k, &model);
            let lines = metrics_lines(&report.metrics);
            println!("{}", style(&lines[0]).cyan().bold());
            print_lines(&lines[1..]);
            if let Some(path) = output {
                save_json(&path, &report.metrics.as_report(), "Metrics")?;
            }
        }
        Commands::Visualize {
            store_id,
            max_results,
            output,
            serve,
            bind,
        } => {
            let api = connect(&cfg, key)?;
            visualize(&cfg, &api, &store_id, max_results, &output, serve, bind)?;
        }
        Commands::CreateAndVisualize {
            store_name,
            pdf_dir,
            max_results,
            output,
            upload_stats,
            serve,
            bind,
        } => {
            let api = connect(&cfg, key)?;
            let details = service::create_vector_store(&api, &store_name)?;
            print_lines(&store_lines(&details));

            let pool = WorkerPool::new(cfg.upload.workers)?;
            let stats = service::upload_pdf_files_to_vector_store(&api, &pool, &details.id, &pdf_dir)?;
            report_upload(&stats, &upload_stats)?;
            if stats.total_files > 0 && stats.successful_uploads == 0 {
                println!(
                    "{}",
                    style("No files uploaded; the visualization may be empty.").yellow()
                );
            }

            visualize(&cfg, &api, &details.id, max_results, &output, serve, bind)?;
        }
        Commands::StagePdfs {
            target_dir,
            source,
            local_pdfs,
            urls,
        } => stage(&cfg, &target_dir, source, &local_pdfs, &urls)?,
    }
    Ok(())
}

fn connect(cfg: &AppConfig, override_key: Option<&str>) -> Result<OpenAiClient> {
    let key = cfg.api.resolve_api_key(override_key)?;
    OpenAiClient::from_settings(&cfg.api, key).context("building API client")
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn save_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    core_serialization::write_json(path, value)?;
    println!(
        "{}",
        style(format!("{what} saved to {}", path.display())).green()
    );
    Ok(())
}

fn report_upload(stats: &UploadStats, path: &Path) -> Result<()> {
    let summary = upload_summary(stats);
    if stats.failed_uploads == 0 {
        println!("{}", style(summary).green());
    } else {
        println!("{}", style(summary).yellow());
        for failure in &stats.errors {
            println!(
                "  {} {}",
                style(&failure.file).red(),
                failure.error.as_deref().unwrap_or_default()
            );
        }
    }
    save_json(path, stats, "Upload statistics")
}

fn visualize(
    cfg: &AppConfig,
    api: &OpenAiClient,
    store_id: &str,
    max_results: Option<usize>,
    output: &Path,
    serve: bool,
    bind: Option<String>,
) -> Result<()> {
    let mut pipeline = Pipeline::from_settings(&cfg.visualization, &cfg.models.embedding_model);
    if let Some(max) = max_results {
        pipeline = pipeline.with_max_results(max);
    }
    let projection = pipeline
        .run(api, store_id)
        .with_context(|| format!("visualizing vector store {store_id}"))?;
    print_lines(&store_lines(&projection.store));
    println!(
        "{}",
        style(projection_summary(
            projection.rows.len(),
            &projection.reducer,
            &cluster_counts(&projection.rows)
        ))
        .cyan()
    );

    let title = format!("{}: {}", cfg.visualization.title, projection.store.name);
    viewer::write_html(&projection.rows, output, &title)?;
    println!(
        "{}",
        style(format!("Visualization saved to {}", output.display())).green()
    );

    if serve {
        let bind = bind.unwrap_or_else(|| cfg.viewer.bind.clone());
        println!(
            "{}",
            style(format!("Viewer running at http://{bind} (Ctrl-C to stop)")).cyan()
        );
        viewer::serve_blocking(ViewerState::new(projection.rows, title), &bind)?;
    }
    Ok(())
}

fn stage(
    cfg: &AppConfig,
    target_dir: &Path,
    source: SourceArg,
    local_pdfs: &[PathBuf],
    urls: &[String],
) -> Result<()> {
    let report = match source {
        SourceArg::Copy => {
            if local_pdfs.is_empty() {
                bail!("--local-pdfs is required with --source copy");
            }
            staging::copy_all(local_pdfs, target_dir)?
        }
        SourceArg::Download => {
            if urls.is_empty() {
                bail!("--urls is required with --source download");
            }
            let mut builder = reqwest::blocking::Client::builder();
            if let Some(secs) = cfg.api.request_timeout_secs {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            let client = builder.build().context("building HTTP client")?;
            staging::download_all(&client, urls, target_dir)?
        }
    };
    let verb = match source {
        SourceArg::Copy => "copied",
        SourceArg::Download => "downloaded",
    };
    let line = format!(
        "Successfully {verb} {} of {} PDFs",
        report.succeeded, report.attempted
    );
    if report.succeeded == report.attempted {
        println!("{}", style(line).green());
    } else {
        println!("{}", style(line).yellow());
    }
    println!("Total PDFs in {}: {}", target_dir.display(), report.total_in_dir);
    Ok(())
}
