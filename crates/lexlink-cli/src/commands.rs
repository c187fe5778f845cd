//! Command handlers.

use crate::config::CliConfig;
use crate::{Commands, DocTypeArg};
use anyhow::{Context, Result, bail};
use lexlink_core::{DocumentStore, LinkStore, StoreConfig, TreeView};
use lexlink_index::{
    DenseIndex, DenseIndexBuilder, EmbeddingProvider, GenerationPointer, GenerationStore,
    HashingEmbedding, HttpEmbedding, LexicalIndex, LexicalIndexBuilder, truncate_for_embedding,
};
use lexlink_ingest::{IngestConfig, IngestPipeline, RuleBasedLinkExtractor, SourceDocument};
use lexlink_retrieval::{HybridRetriever, QueryCache, RetrieveOptions, format_context};
use lexlink_validate::{ContextDocument, ValidationPipeline, ValidationRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs one parsed command.
pub async fn dispatch(command: Commands, config: &CliConfig) -> Result<()> {
    match command {
        Commands::Ingest { doc_type, files } => ingest(config, doc_type, &files),
        Commands::ReindexLex => reindex_lex(config),
        Commands::ReindexDense => reindex_dense(config).await,
        Commands::ExtractLinks { output } => extract_links(config, output.as_deref()),
        Commands::PopulateLinks { file } => populate_links(config, &file),
        Commands::Query {
            text,
            top_k,
            no_links,
            show_context,
        } => query(config, &text, top_k, no_links, show_context).await,
        Commands::Validate {
            answer_file,
            query,
            context_file,
        } => validate(config, &answer_file, query.as_deref(), context_file.as_deref()),
        Commands::Stats => stats(config),
        Commands::Tree { doc_id } => tree(config, &doc_id),
    }
}

fn load_store(config: &CliConfig) -> Result<DocumentStore> {
    let path = config.storage.corpus_path();
    if path.exists() {
        Ok(DocumentStore::load(&path, StoreConfig::default())?)
    } else {
        Ok(DocumentStore::new())
    }
}

fn save_store(config: &CliConfig, store: &DocumentStore) -> Result<()> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    store.save(&config.storage.corpus_path())?;
    Ok(())
}

fn load_links(config: &CliConfig) -> Result<LinkStore> {
    let path = config.storage.links_path();
    if path.exists() {
        Ok(LinkStore::load(&path)?)
    } else {
        Ok(LinkStore::new())
    }
}

fn embedder(config: &CliConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedding::new(config.embedding.dimensions))),
        "http" => {
            let api_key = std::env::var(&config.embedding.api_key_env).with_context(|| {
                format!("embedding API key env {} not set", config.embedding.api_key_env)
            })?;
            let mut provider = HttpEmbedding::new(
                api_key,
                config.embedding.model.clone(),
                config.embedding.dimensions,
            );
            if let Some(base_url) = &config.embedding.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        other => bail!("unknown embedding provider {other:?} (expected hashing or http)"),
    }
}

fn ingest(config: &CliConfig, doc_type: Option<DocTypeArg>, files: &[PathBuf]) -> Result<()> {
    let mut store = load_store(config)?;
    let pipeline = IngestPipeline::new(IngestConfig::default());

    for file in files {
        let raw_text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let mut source = SourceDocument::new(file.display().to_string(), raw_text);
        if let Some(doc_type) = doc_type {
            source = source.with_declared_type(doc_type.into());
        }

        match pipeline.ingest(&source, &mut store) {
            Ok(report) => {
                println!("{}", report.summary());
                for skip in &report.skipped {
                    println!("  skipped {}: {}", skip.doc_id, skip.reason);
                }
            }
            Err(error) => println!("{}: failed: {error}", file.display()),
        }
    }

    save_store(config, &store)?;
    println!("corpus now holds {} documents", store.len());
    Ok(())
}

fn reindex_lex(config: &CliConfig) -> Result<()> {
    let store = load_store(config)?;
    if store.is_empty() {
        bail!("corpus is empty; ingest sources first");
    }

    let mut builder = LexicalIndexBuilder::new();
    builder.add_all(store.index_units());
    let index = builder.build();

    let generations = GenerationStore::open(config.storage.lexical_root())?;
    let (id, dir) = generations.begin()?;
    index.save(&dir.join("lexical.json"))?;
    generations.commit(id)?;

    println!("lexical generation {id} committed ({} units)", index.len());
    Ok(())
}

async fn reindex_dense(config: &CliConfig) -> Result<()> {
    let store = load_store(config)?;
    if store.is_empty() {
        bail!("corpus is empty; ingest sources first");
    }
    let provider = embedder(config)?;

    let mut builder = DenseIndexBuilder::new(config.embedding.dimensions);
    let mut failed = 0usize;
    for unit in store.index_units() {
        let text = truncate_for_embedding(&unit.text, config.embedding.char_budget);
        match provider.embed(text).await {
            Ok(vector) => builder.add(&unit.unit_id, &vector)?,
            Err(error) => {
                tracing::warn!(unit = %unit.unit_id, %error, "embedding failed, excluding unit");
                builder.add_failed(&unit.unit_id);
                failed += 1;
            }
        }
    }
    let index = builder.build();

    let generations = GenerationStore::open(config.storage.dense_root())?;
    let (id, dir) = generations.begin()?;
    index.save(&dir.join("dense.bin"), &dir.join("mapping.json"))?;
    generations.commit(id)?;

    println!(
        "dense generation {id} committed ({} vectors, {failed} failed embeddings)",
        index.len()
    );
    Ok(())
}

fn extract_links(config: &CliConfig, output: Option<&Path>) -> Result<()> {
    let store = load_store(config)?;
    let candidates = RuleBasedLinkExtractor::new().extract(&store)?;
    println!("extracted {} candidate links", candidates.len());

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&candidates)?;
            std::fs::write(path, json)?;
            println!("candidates written to {}", path.display());
        }
        None => {
            let mut links = load_links(config)?;
            let mut merged = 0usize;
            for link in candidates {
                if links.upsert(link)? {
                    merged += 1;
                }
            }
            std::fs::create_dir_all(&config.storage.data_dir)?;
            links.save(&config.storage.links_path())?;
            println!("merged {merged} links; store now holds {}", links.len());
        }
    }
    Ok(())
}

fn populate_links(config: &CliConfig, file: &Path) -> Result<()> {
    let incoming = LinkStore::load(file)?;
    let store = load_store(config)?;
    incoming.validate_references(&store)?;

    let mut links = load_links(config)?;
    let mut merged = 0usize;
    for link in incoming.iter() {
        if links.upsert(link.clone())? {
            merged += 1;
        }
    }
    std::fs::create_dir_all(&config.storage.data_dir)?;
    links.save(&config.storage.links_path())?;
    println!("merged {merged} links; store now holds {}", links.len());
    Ok(())
}

fn load_lexical(config: &CliConfig) -> Result<LexicalIndex> {
    let generations = GenerationStore::open(config.storage.lexical_root())?;
    match generations.current_dir()? {
        Some(dir) => Ok(LexicalIndex::load(&dir.join("lexical.json"))?),
        None => Ok(LexicalIndexBuilder::new().build()),
    }
}

fn load_dense(config: &CliConfig) -> Result<DenseIndex> {
    let generations = GenerationStore::open(config.storage.dense_root())?;
    match generations.current_dir()? {
        Some(dir) => Ok(DenseIndex::load(
            &dir.join("dense.bin"),
            &dir.join("mapping.json"),
            config.embedding.dimensions,
        )?),
        None => Ok(DenseIndexBuilder::new(config.embedding.dimensions).build()),
    }
}

async fn query(
    config: &CliConfig,
    text: &str,
    top_k: Option<usize>,
    no_links: bool,
    show_context: bool,
) -> Result<()> {
    let store = Arc::new(load_store(config)?);
    let links = Arc::new(load_links(config)?);
    let lexical = Arc::new(GenerationPointer::new(load_lexical(config)?));
    let dense = Arc::new(GenerationPointer::new(load_dense(config)?));
    let provider = embedder(config)?;

    let retriever = HybridRetriever::new(
        store,
        links,
        lexical,
        dense,
        provider,
        config.retrieval.clone(),
    )
    .with_cache(QueryCache::new(8 * 1024 * 1024));

    let options = RetrieveOptions {
        top_k,
        use_interpretation_links: no_links.then_some(false),
        ..Default::default()
    };
    let retrieval = retriever.retrieve(text, options).await?;

    println!(
        "{} results in {} ms (correlation {})",
        retrieval.results.len(),
        retrieval.elapsed_ms,
        retrieval.correlation_id
    );
    if retrieval.partial {
        println!("note: partial result (deadline or timeout hit)");
    }
    for warning in &retrieval.warnings {
        println!("warning: {warning}");
    }

    for (rank, result) in retrieval.results.iter().enumerate() {
        let mut tags = Vec::new();
        if let Some(statute) = &result.interprets_statute {
            tags.push(format!("interprets {statute}"));
        }
        if result.synthetic {
            tags.push("injected".to_string());
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        println!(
            "{:>2}. {:.4}  {} ({}){tags}",
            rank + 1,
            result.score,
            result.unit_id,
            result.doc_type,
        );
    }

    if show_context {
        println!("\n{}", format_context(&retrieval.results));
    }
    Ok(())
}

fn validate(
    config: &CliConfig,
    answer_file: &Path,
    query: Option<&str>,
    context_file: Option<&Path>,
) -> Result<()> {
    let answer = std::fs::read_to_string(answer_file)
        .with_context(|| format!("reading {}", answer_file.display()))?;
    let context: Vec<ContextDocument> = match context_file {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => Vec::new(),
    };

    let links = Arc::new(load_links(config)?);
    let pipeline = ValidationPipeline::new(links, config.validation.clone());
    let result = pipeline.validate(&ValidationRequest {
        query: query.map(str::to_string),
        answer,
        context,
        correlation_id: None,
    })?;

    println!("{}", serde_json::to_string_pretty(&result.to_value())?);
    Ok(())
}

fn stats(config: &CliConfig) -> Result<()> {
    let store = load_store(config)?;
    let links = load_links(config)?;
    let stats = store.statistics();

    println!("documents: {}", stats.total_documents);
    println!("  statutes: {}", stats.statutes);
    println!("  cases:    {}", stats.cases);
    println!("  rules:    {}", stats.rules);
    println!("  roots:    {}", stats.roots);
    println!("  level 1:  {}", stats.sections);
    println!("  level 2+: {}", stats.leaves_below_section);
    println!("interpretation links: {}", links.len());
    let verified = links.iter().filter(|l| l.verified).count();
    println!("  verified: {verified}");
    Ok(())
}

fn tree(config: &CliConfig, doc_id: &str) -> Result<()> {
    let store = load_store(config)?;
    store.get_required(doc_id)?;
    let view = TreeView::new(&store);

    let issues = view.validate(doc_id);
    println!("{}", view.render(doc_id));
    if !issues.is_empty() {
        println!("\nstructural issues:");
        for issue in issues {
            println!("  {issue:?}");
        }
    }
    Ok(())
}
