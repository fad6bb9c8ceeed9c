use reqwest::Url;
use tracing::info;

use crate::company::search::{CompanyHit, CompanySearch};
use crate::errors::AppError;

pub const COMPANY_FIELD: &str = "company_name";

/// Builds the company blurb for a name or website.
///
/// Missing search results yield a placeholder rather than an error; search
/// failures are returned for the caller to surface or swallow.
pub async fn enrich(search: &dyn CompanySearch, input: &str, max_chars: usize) -> Result<String, AppError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(AppError::invalid_field(COMPANY_FIELD, "please enter a company name"));
    }

    let subject = search_subject(name);
    info!("Analyzing company: {}", subject);

    let blurb = match search.search_company(&subject).await? {
        Some(hit) => format_company_blurb(&subject, &hit),
        None => {
            info!("No search results for {}", subject);
            format!("No information found for {subject}.")
        }
    };

    Ok(truncate_chars(&blurb, max_chars).to_string())
}

/// A website address is reduced to its host without `www.`; anything else is
/// used as typed.
pub fn search_subject(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return input.to_string();
    }
    Url::parse(input)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| input.to_string())
}

pub fn format_company_blurb(subject: &str, hit: &CompanyHit) -> String {
    let mut blurb = format!("## {} ##\n\n", subject.to_uppercase());

    if let Some(summary) = hit.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        blurb.push_str(summary);
        blurb.push_str("\n\n");
    }

    if let Some(highlight) = hit.highlights.iter().map(|h| h.trim()).find(|h| !h.is_empty()) {
        blurb.push_str("Additional information:\n");
        blurb.push_str(highlight);
        blurb.push_str("\n\n");
    }

    let title = hit.title.as_deref().unwrap_or("").trim();
    let url = hit.url.as_deref().unwrap_or("").trim();
    if !title.is_empty() || !url.is_empty() {
        blurb.push_str(&format!("Source: {title} ({url})"));
    }

    blurb.trim_end().to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
