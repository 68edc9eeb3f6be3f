use readability::extractor;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use super::{count_words, ArticleScraper};

/// Tunable noise-selector list for the pre-clean pass; one CSS selector per
/// line, `#` comments.
const NOISE_SELECTORS: &str = include_str!("../../data/noise_selectors.txt");

/// Tunable post-clean pass: one case-insensitive regex per line, applied to
/// each trimmed line of the extracted body; matching lines are dropped.
const POST_CLEAN_PATTERNS: &str = include_str!("../../data/post_clean_patterns.txt");

fn data_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

impl ArticleScraper {
    /// Detach every DOM node matching the curated noise-selector list
    /// (navigation, author blocks, share widgets, related posts, cookie
    /// banners, reading-time chips, comments) before readability runs.
    pub(super) fn pre_clean(&self, html: &str) -> String {
        let mut document = Html::parse_document(html);

        let mut doomed = Vec::new();
        for line in data_lines(NOISE_SELECTORS) {
            let Ok(selector) = Selector::parse(line) else {
                warn!("skipping unparsable noise selector: {line}");
                continue;
            };
            doomed.extend(document.select(&selector).map(|el| el.id()));
        }
        for id in doomed {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        document.root_element().html()
    }

    pub(super) fn readability_pass(&self, html: &str, base_url: &Url) -> String {
        match extractor::extract(&mut html.as_bytes(), base_url) {
            Ok(product) => html2md::parse_html(&product.content),
            Err(e) => {
                warn!("readability extraction failed: {e}, falling back to heuristics");
                String::new()
            }
        }
    }

    /// Scan common main-content containers and keep the one with the most
    /// words. Backstop for pages readability handles poorly.
    pub(super) fn heuristic_main_extraction(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let selectors = [
            "article",
            "main",
            "[role=main]",
            "[itemprop=articleBody]",
            ".entry-content",
            ".post-content",
            ".article-content",
            "#content",
            "#main",
            ".content",
        ];

        let mut best_text = String::new();
        let mut best_words = 0usize;
        for sel_str in selectors {
            let Ok(sel) = Selector::parse(sel_str) else {
                continue;
            };
            for el in document.select(&sel) {
                let text = el.text().collect::<Vec<_>>().join(" ");
                let wc = count_words(&text);
                if wc > best_words {
                    best_words = wc;
                    best_text = text;
                }
            }
        }
        best_text
    }

    /// Strip residual metadata lines (bylines, datelines, reading-time,
    /// share/subscribe residue), normalize whitespace, dedup repeated lines.
    pub(super) fn post_clean(&self, text: &str) -> String {
        let patterns: Vec<Regex> = data_lines(POST_CLEAN_PATTERNS)
            .filter_map(|line| match Regex::new(&format!("(?i){line}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("skipping unparsable post-clean pattern '{line}': {e}");
                    None
                }
            })
            .collect();

        let mut kept: Vec<String> = Vec::new();
        for line in text.lines() {
            let line = collapse_spaces(line);
            if line.len() < 2 {
                continue;
            }
            if patterns.iter().any(|re| re.is_match(&line)) {
                continue;
            }
            kept.push(line);
        }
        kept.dedup();
        kept.join("\n")
    }
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_clean_drops_metadata_lines() {
        let scraper = ArticleScraper::new();
        let text = "A real paragraph about something substantive.\n\
                    By Jane Doe\n\
                    5 min read\n\
                    March 3, 2024\n\
                    Share on Twitter\n\
                    Another real paragraph with more substance in it.";
        let cleaned = scraper.post_clean(text);
        assert!(cleaned.contains("real paragraph"));
        assert!(!cleaned.contains("By Jane Doe"));
        assert!(!cleaned.contains("min read"));
        assert!(!cleaned.contains("March 3, 2024"));
        assert!(!cleaned.contains("Share on Twitter"));
    }

    #[test]
    fn test_post_clean_dedups_lines() {
        let scraper = ArticleScraper::new();
        let text = "Repeated line of content here.\nRepeated line of content here.\nUnique line.";
        let cleaned = scraper.post_clean(text);
        assert_eq!(cleaned.matches("Repeated line").count(), 1);
    }

    #[test]
    fn test_pre_clean_removes_noise_nodes() {
        let scraper = ArticleScraper::new();
        let html = r#"<html><body>
            <nav>Site navigation links</nav>
            <div class="byline">By Someone Famous</div>
            <p>Body copy that stays.</p>
            <div class="newsletter">Subscribe to our newsletter</div>
        </body></html>"#;
        let cleaned = scraper.pre_clean(html);
        assert!(cleaned.contains("Body copy that stays."));
        assert!(!cleaned.contains("Site navigation links"));
        assert!(!cleaned.contains("Subscribe to our newsletter"));
    }
}
