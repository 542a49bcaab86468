//! Scrapes a gallery listing page for current exhibitions.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::config::ExhibitionSourceConfig;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawledExhibition {
    pub title: String,
    pub venue: Option<String>,
    pub schedule: Option<String>,
    pub source_url: String,
    pub image_url: Option<String>,
}

pub struct ExhibitionCrawler {
    http: reqwest::Client,
    source: ExhibitionSourceConfig,
}

impl ExhibitionCrawler {
    pub fn new(http: reqwest::Client, source: ExhibitionSourceConfig) -> Self {
        Self { http, source }
    }

    pub async fn crawl(&self) -> Result<Vec<CrawledExhibition>, CrawlError> {
        let body = self
            .http
            .get(&self.source.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let items = parse_listing(&body, &self.source)?;
        tracing::info!(url = %self.source.url, found = items.len(), "exhibition page crawled");
        Ok(items)
    }
}

struct Selectors {
    item: Selector,
    title: Selector,
    venue: Option<Selector>,
    schedule: Option<Selector>,
    link: Selector,
    image: Option<Selector>,
}

fn selector(raw: &str) -> Result<Selector, CrawlError> {
    Selector::parse(raw).map_err(|e| CrawlError::Selector(format!("{raw}: {e:?}")))
}

fn optional_selector(raw: Option<&String>) -> Result<Option<Selector>, CrawlError> {
    raw.map(|s| selector(s)).transpose()
}

impl Selectors {
    fn compile(source: &ExhibitionSourceConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            item: selector(&source.item_selector)?,
            title: selector(&source.title_selector)?,
            venue: optional_selector(source.venue_selector.as_ref())?,
            schedule: optional_selector(source.schedule_selector.as_ref())?,
            link: selector(&source.link_selector)?,
            image: optional_selector(source.image_selector.as_ref())?,
        })
    }
}

/// Extracts exhibitions from a listing page. Items without a title or link are skipped.
pub fn parse_listing(
    html: &str,
    source: &ExhibitionSourceConfig,
) -> Result<Vec<CrawledExhibition>, CrawlError> {
    let selectors = Selectors::compile(source)?;
    let base = Url::parse(&source.url)?;
    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for item in document.select(&selectors.item) {
        let Some(title) = first_text(item, &selectors.title) else {
            continue;
        };
        let Some(href) = item
            .select(&selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Ok(source_url) = base.join(href) else {
            tracing::debug!(href = %href, "skipping exhibition with unparsable link");
            continue;
        };

        let image_url = selectors
            .image
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| base.join(src).ok())
            .map(|u| u.to_string());

        items.push(CrawledExhibition {
            title,
            venue: selectors.venue.as_ref().and_then(|s| first_text(item, s)),
            schedule: selectors.schedule.as_ref().and_then(|s| first_text(item, s)),
            source_url: source_url.to_string(),
            image_url,
        });
    }
    Ok(items)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ExhibitionSourceConfig {
        ExhibitionSourceConfig {
            url: "https://gallery.example/exhibitions/".into(),
            item_selector: "article.exhibition".into(),
            title_selector: "h2".into(),
            venue_selector: Some(".venue".into()),
            schedule_selector: Some(".dates".into()),
            link_selector: "a".into(),
            image_selector: Some("img".into()),
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <article class="exhibition">
            <h2>  Silk &amp;
                Lacquer </h2>
            <p class="venue">Hall A</p>
            <p class="dates">1 Mar - 30 Apr</p>
            <a href="silk-lacquer">More</a>
            <img data-src="/img/silk.jpg">
          </article>
          <article class="exhibition">
            <h2></h2>
            <a href="/untitled">More</a>
          </article>
          <article class="exhibition">
            <h2>No link here</h2>
          </article>
          <article class="exhibition">
            <h2>Ink Landscapes</h2>
            <a href="https://other.example/ink">More</a>
          </article>
        </body></html>
    "#;

    #[test]
    fn extracts_items_and_resolves_links() {
        let items = parse_listing(PAGE, &source()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            CrawledExhibition {
                title: "Silk & Lacquer".into(),
                venue: Some("Hall A".into()),
                schedule: Some("1 Mar - 30 Apr".into()),
                source_url: "https://gallery.example/exhibitions/silk-lacquer".into(),
                image_url: Some("https://gallery.example/img/silk.jpg".into()),
            }
        );
        assert_eq!(items[1].title, "Ink Landscapes");
        assert_eq!(items[1].source_url, "https://other.example/ink");
        assert_eq!(items[1].venue, None);
    }

    #[test]
    fn invalid_selector_is_reported() {
        let mut bad = source();
        bad.item_selector = "[[".into();
        assert!(matches!(
            parse_listing(PAGE, &bad),
            Err(CrawlError::Selector(_))
        ));
    }
}
