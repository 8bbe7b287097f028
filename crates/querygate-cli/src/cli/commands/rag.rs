use super::{exit_codes, open_context};
use crate::cli::args::{RagAddArgs, RagSearchArgs};
use anyhow::Context;
use querygate_core::embeddings::LocalEmbedding;
use querygate_core::storage::NewRagDocument;
use tokio::io::AsyncReadExt;

pub async fn add(args: RagAddArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;

    let content = if args.file == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("failed to read {}", args.file))?
    };
    if content.trim().is_empty() {
        anyhow::bail!("refusing to index an empty document");
    }

    let doc = NewRagDocument {
        data_source_id: args.data_source.clone(),
        doc_type: args.doc_type.clone(),
        ref_id: args.ref_id.clone(),
        content,
        metadata: serde_json::json!({ "source": args.file }),
    };
    let embedder = LocalEmbedding::new(ctx.config.rag.dim);
    let id = ctx.store.insert_rag_document(&doc, &embedder)?;
    println!("{}", id);
    Ok(exit_codes::OK)
}

pub fn search(args: RagSearchArgs) -> anyhow::Result<i32> {
    let ctx = open_context(&args.config)?;
    let limit = args.limit.unwrap_or(ctx.config.rag.limit);
    let docs = ctx
        .retrieval()
        .retrieve(&ctx.store, &args.data_source, &args.question, limit)?;
    for d in &docs {
        println!(
            "{:>7.3}  #{} [{}:{}] {}",
            d.score,
            d.document.id,
            d.document.doc_type,
            d.document.ref_id.as_deref().unwrap_or(""),
            d.document.content.lines().next().unwrap_or("")
        );
    }
    Ok(exit_codes::OK)
}
