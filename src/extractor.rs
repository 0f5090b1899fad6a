//! Embed player extraction from episode pages
//!
//! The episode page is untrusted third-party markup. Extraction is a pure
//! scan over the document text (or its parsed tree); nothing in the page is
//! ever executed.
//!
//! Two pattern families are recognised, each bound to a fixed provider and
//! quality label:
//!
//! - primary host: an iframe whose URL host is one of the configured primary
//!   streaming hosts (`720p`, `primary-host`)
//! - mirror host: an iframe whose URL contains the mirror marker
//!   (`480p`, `mirror-host`)
//!
//! All primary matches come first in document order, followed by all mirror
//! matches in document order. That order is the preference order used by the
//! resolver.
//!
//! Both strategies yield the decoded attribute value, so `&amp;` in the
//! markup becomes `&` in the candidate URL whichever strategy is configured.

use crate::models::{CandidateStream, Provider};
use regex::{Captures, Regex, RegexBuilder};
use scraper::{Html, Selector};
use std::borrow::Cow;

/// Turns an episode page into an ordered list of candidate streams.
/// An empty result is a valid outcome.
pub trait EmbedExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<CandidateStream>;

    /// Short strategy name for logs
    fn name(&self) -> &'static str;
}

/// Raw-text scan for `<iframe ... src="...">` references
pub struct RegexExtractor {
    primary: Option<Regex>,
    mirror: Option<Regex>,
    entity: Regex,
}

impl RegexExtractor {
    pub fn new(primary_hosts: &[String], mirror_marker: &str) -> Result<Self, regex::Error> {
        let hosts: Vec<String> = primary_hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(regex::escape)
            .collect();

        let primary = if hosts.is_empty() {
            None
        } else {
            let pattern = format!(
                r#"<iframe[^>]*src=["'](https://(?:{})/[^"']+)["']"#,
                hosts.join("|")
            );
            Some(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
        };

        let marker = mirror_marker.trim();
        let mirror = if marker.is_empty() {
            None
        } else {
            let pattern = format!(
                r#"<iframe[^>]*src=["'](https://[^"']*{}[^"']*)["']"#,
                regex::escape(marker)
            );
            Some(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
        };

        let entity = RegexBuilder::new(r"&(amp|quot|apos|lt|gt|#38|#x26|#39|#x27);")
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            primary,
            mirror,
            entity,
        })
    }

    /// Single pass, so `&amp;lt;` decodes to `&lt;` and not `<`
    fn decode<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        self.entity.replace_all(raw, |caps: &Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "amp" | "#38" | "#x26" => "&",
                "quot" => "\"",
                "apos" | "#39" | "#x27" => "'",
                "lt" => "<",
                _ => ">",
            }
        })
    }

    fn scan(&self, re: &Regex, html: &str, provider: Provider, out: &mut Vec<CandidateStream>) {
        for caps in re.captures_iter(html) {
            if let Some(url) = caps.get(1) {
                out.push(CandidateStream::new(self.decode(url.as_str()), provider));
            }
        }
    }
}

impl EmbedExtractor for RegexExtractor {
    fn extract(&self, html: &str) -> Vec<CandidateStream> {
        let mut out = Vec::new();
        if let Some(re) = &self.primary {
            self.scan(re, html, Provider::PrimaryHost, &mut out);
        }
        if let Some(re) = &self.mirror {
            self.scan(re, html, Provider::MirrorHost, &mut out);
        }
        out
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

/// Parses the page with an HTML5 parser and inspects `iframe[src]` elements.
/// Scripts are parsed as inert text.
pub struct DomExtractor {
    iframe: Selector,
    primary_hosts: Vec<String>,
    mirror_marker: String,
}

impl DomExtractor {
    pub fn new(primary_hosts: &[String], mirror_marker: &str) -> Result<Self, String> {
        let iframe = Selector::parse("iframe[src]").map_err(|e| format!("{:?}", e))?;
        Ok(Self {
            iframe,
            primary_hosts: primary_hosts
                .iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            mirror_marker: mirror_marker.trim().to_lowercase(),
        })
    }

    fn is_primary(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        let Some(rest) = lower.strip_prefix("https://") else {
            return false;
        };
        match rest.split_once('/') {
            Some((host, path)) => {
                !path.is_empty() && self.primary_hosts.iter().any(|h| h == host)
            }
            None => false,
        }
    }

    fn is_mirror(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        !self.mirror_marker.is_empty()
            && lower.starts_with("https://")
            && lower.contains(&self.mirror_marker)
    }
}

impl EmbedExtractor for DomExtractor {
    fn extract(&self, html: &str) -> Vec<CandidateStream> {
        let document = Html::parse_document(html);
        let srcs: Vec<String> = document
            .select(&self.iframe)
            .filter_map(|el| el.value().attr("src"))
            .map(|s| s.trim().to_string())
            .collect();

        let mut out: Vec<CandidateStream> = srcs
            .iter()
            .filter(|src| self.is_primary(src))
            .map(|src| CandidateStream::new(src.as_str(), Provider::PrimaryHost))
            .collect();
        out.extend(
            srcs.iter()
                .filter(|src| self.is_mirror(src))
                .map(|src| CandidateStream::new(src.as_str(), Provider::MirrorHost)),
        );
        out
    }

    fn name(&self) -> &'static str {
        "dom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quality;

    const MIXED: &str = r#"
        <html><body>
        <div class="player">
          <iframe src="https://primary.example/first" allowfullscreen></iframe>
        </div>
        <iframe width="640" src="https://cdn-mirror.example/only-mirror"></iframe>
        <iframe src='https://primary.example/second'></iframe>
        <iframe src="https://unrelated.example/ad"></iframe>
        </body></html>
    "#;

    fn hosts() -> Vec<String> {
        vec!["primary.example".to_string()]
    }

    fn assert_ordering(found: &[CandidateStream]) {
        // Duplicates are kept
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].url, "https://primary.example/first");
        assert_eq!(found[1].url, "https://primary.example/first");
        assert_eq!(found[2].url, "https://primary.example/second");
        assert_eq!(found[3].url, "https://cdn-mirror.example/only-mirror");
        for c in &found[..3] {
            assert_eq!(c.provider, Provider::PrimaryHost);
            assert_eq!(c.quality, Quality::P720);
        }
        assert_eq!(found[3].provider, Provider::MirrorHost);
        assert_eq!(found[3].quality, Quality::P480);
    }

    #[test]
    fn test_regex_primary_before_mirror() {
        let extractor = RegexExtractor::new(&hosts(), "mirror").unwrap();
        assert_ordering(&extractor.extract(MIXED));
    }

    #[test]
    fn test_dom_primary_before_mirror() {
        let extractor = DomExtractor::new(&hosts(), "mirror").unwrap();
        assert_ordering(&extractor.extract(MIXED));
    }

    #[test]
    fn test_no_patterns_is_empty() {
        let html = r#"<html><iframe src="https://other.example/x"></iframe><p>soon</p></html>"#;
        let regex = RegexExtractor::new(&hosts(), "mirror").unwrap();
        let dom = DomExtractor::new(&hosts(), "mirror").unwrap();
        assert!(regex.extract(html).is_empty());
        assert!(dom.extract(html).is_empty());
    }

    #[test]
    fn test_regex_is_case_insensitive() {
        let html = r#"<IFRAME SRC="https://primary.example/Upper"></IFRAME>"#;
        let extractor = RegexExtractor::new(&hosts(), "mirror").unwrap();
        let found = extractor.extract(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://primary.example/Upper");
    }

    #[test]
    fn test_host_must_match_exactly() {
        // Host is a prefix only, not the primary host itself
        let html = r#"<iframe src="https://primary.example.evil/x"></iframe>"#;
        let extractor = RegexExtractor::new(&hosts(), "mirror").unwrap();
        assert!(extractor.extract(html).is_empty());
        let dom = DomExtractor::new(&hosts(), "mirror").unwrap();
        assert!(dom.extract(html).is_empty());
    }

    #[test]
    fn test_plain_http_ignored() {
        let html = r#"<iframe src="http://primary.example/x"></iframe>"#;
        let extractor = RegexExtractor::new(&hosts(), "mirror").unwrap();
        assert!(extractor.extract(html).is_empty());
    }

    #[test]
    fn test_script_content_not_treated_as_iframe_by_dom() {
        let html = r#"<script>document.write('<iframe src="https://primary.example/fake"></iframe>')</script>
                      <iframe src="https://primary.example/real"></iframe>"#;
        let dom = DomExtractor::new(&hosts(), "mirror").unwrap();
        let found = dom.extract(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://primary.example/real");

        // The raw-text scan sees script strings too
        let regex = RegexExtractor::new(&hosts(), "mirror").unwrap();
        let urls: Vec<_> = regex.extract(html).into_iter().map(|c| c.url).collect();
        assert_eq!(
            urls,
            vec!["https://primary.example/fake", "https://primary.example/real"]
        );
    }

    #[test]
    fn test_entities_decoded_alike() {
        let html = r#"<iframe src="https://primary.example/embed.php?id=1&amp;q=720"></iframe>
                      <iframe src="https://cdn.example/mirror?a=1&#38;b=&amp;lt;2"></iframe>"#;
        let regex = RegexExtractor::new(&hosts(), "mirror").unwrap();
        let dom = DomExtractor::new(&hosts(), "mirror").unwrap();

        let from_regex = regex.extract(html);
        assert_eq!(from_regex[0].url, "https://primary.example/embed.php?id=1&q=720");
        assert_eq!(from_regex[1].url, "https://cdn.example/mirror?a=1&b=&lt;2");
        assert_eq!(from_regex, dom.extract(html));
    }

    #[test]
    fn test_multiple_primary_hosts() {
        let hosts = vec!["desustream.me".to_string(), "desustream.info".to_string()];
        let html = r#"<iframe src="https://desustream.info/a"></iframe>
                      <iframe src="https://desustream.me/b"></iframe>"#;
        let extractor = RegexExtractor::new(&hosts, "mirror").unwrap();
        let urls: Vec<_> = extractor.extract(html).into_iter().map(|c| c.url).collect();
        assert_eq!(urls, vec!["https://desustream.info/a", "https://desustream.me/b"]);
    }

    #[test]
    fn test_empty_config_disables_families() {
        let extractor = RegexExtractor::new(&[], "").unwrap();
        assert!(extractor.extract(MIXED).is_empty());
    }
}
