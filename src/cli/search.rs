use anyhow::{Result, anyhow};
use console::style;

use super::{Dashboard, parse_command_args};
use crate::core::api::{SearchResult, SearchSource};
use crate::core::cache::QueryPolicy;
use crate::core::search::{SEARCH_LIMIT, SearchRequest, SourceFilter};
use crate::core::terminal::{GuideSection, print_info, truncate};

pub(crate) fn source_filter(values: &[&str]) -> Result<SourceFilter> {
    if values.is_empty() {
        return Ok(SourceFilter::default());
    }
    let sources = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().parse::<SearchSource>().map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;
    SourceFilter::from_sources(sources).ok_or_else(|| anyhow!("at least one source is required"))
}

fn result_line(result: &SearchResult) -> String {
    let score = result
        .score
        .map(|s| format!(" {}", style(format!("{:.2}", s)).dim()))
        .unwrap_or_default();
    format!(
        "{} {} {}{}",
        style(format!("[{}]", result.source.as_str())).cyan(),
        style(if result.title.is_empty() { result.id.as_str() } else { result.title.as_str() }).bold(),
        style(format!("→ {}", result.page())).dim(),
        score
    )
}

pub async fn run_search_command(app: &Dashboard, args: &[String]) -> Result<()> {
    let parsed = parse_command_args(args, 2, &[]);
    let filter = source_filter(&parsed.values("--source"))?;
    let text = parsed.rest_from(0);

    let Some(mut request) = SearchRequest::new(&text, &filter) else {
        print_info("Type something to search for, e.g. milo-dashboard search invoice");
        return Ok(());
    };
    if let Some(limit) = parsed.value("--limit").and_then(|l| l.parse().ok()) {
        request.limit = limit;
    }

    let gateway = app.gateway.clone();
    let query = app.client.query(request.key(), QueryPolicy::SEARCH, {
        let request = request.clone();
        move || {
            let gateway = gateway.clone();
            let request = request.clone();
            async move { request.run(&gateway).await }
        }
    });
    let state = query.get().await;
    if let Some(e) = state.error {
        return Err(e.into());
    }
    let results = state.data.unwrap_or_default();

    let sources: Vec<&str> = request.sources.iter().map(|s| s.as_str()).collect();
    let mut section = GuideSection::new(&format!(
        "Results for '{}' ({})",
        request.query,
        results.len()
    ))
    .hint(&format!("sources: {}", sources.join(", ")));
    if results.is_empty() {
        section = section.text("Nothing found.");
    }
    for result in &results {
        section = section.bullet(&result_line(result));
        if let Some(snippet) = result.snippet.as_deref().filter(|s| !s.is_empty()) {
            section = section.hint(&format!("  {}", truncate(snippet, 100)));
        }
    }
    if results.len() as u32 >= request.limit {
        section = section.blank().hint(&format!(
            "Showing the first {} results; refine the query or pass --limit (default {}).",
            request.limit, SEARCH_LIMIT
        ));
    }
    section.print();
    println!();
    Ok(())
}
