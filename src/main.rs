//! Amnesia Annotations CLI
//!
//! Dumps the highlights and sticky notes of a PDF as JSON, one object per
//! page that carries any.
//!
//! ```text
//! amnesia-annotations <file.pdf>
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amnesia_annotations::annotations::{self, notes, Highlight, Note};
use amnesia_annotations::engine::MupdfEngine;
use amnesia_annotations::{Config, Document};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageAnnotations {
    page_index: u32,
    highlights: Vec<Highlight>,
    notes: Vec<Note>,
}

fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: amnesia-annotations <file.pdf>");
    };

    tracing::info!("Amnesia Annotations v{}", env!("CARGO_PKG_VERSION"));

    let engine = MupdfEngine::open(&path).with_context(|| format!("failed to open {}", path))?;
    let doc = Arc::new(Document::with_config(path.clone(), engine, config));

    let mut pages = Vec::new();
    for index in 0..doc.page_count() {
        let page = doc
            .load_page(index)
            .with_context(|| format!("failed to load page {}", index))?;

        let highlights = annotations::extract(&page)
            .with_context(|| format!("failed to read highlights on page {}", index))?;
        let notes = notes::list(&page)
            .with_context(|| format!("failed to read notes on page {}", index))?;
        page.unload();

        if highlights.is_empty() && notes.is_empty() {
            continue;
        }
        pages.push(PageAnnotations {
            page_index: index,
            highlights,
            notes,
        });
    }

    tracing::info!("Found annotations on {} of {} pages", pages.len(), doc.page_count());
    println!("{}", serde_json::to_string_pretty(&pages)?);
    Ok(())
}
