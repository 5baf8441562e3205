// src/browser/http.rs

//! `Page` over plain HTTP: the current document is whatever the last GET
//! returned, and clicks follow links.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use url::Url;

use super::{ApiResponse, Page};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::parser::parse_selector;
use crate::utils::http::create_async_client;
use crate::utils::resolve_url;

/// Owns the HTTP client (and its cookie jar) for one crawl run.
///
/// Call [`HttpSession::close`] when done; dropping an open session logs a
/// warning.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    base_url: Url,
    closed: bool,
}

impl HttpSession {
    pub fn open(config: &Config) -> Result<Self> {
        let client = create_async_client(&config.crawler)?;
        let base_url = Url::parse(&config.crawler.base_url)?;
        log::debug!("HTTP session opened for {base_url}");
        Ok(Self {
            client,
            base_url,
            closed: false,
        })
    }

    pub fn new_page(&self) -> HttpPage {
        HttpPage {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn close(mut self) {
        self.closed = true;
        log::debug!("HTTP session closed");
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("HTTP session dropped without close()");
        }
    }
}

#[derive(Debug, Clone)]
struct Document {
    url: Url,
    html: String,
}

#[derive(Debug, Default)]
struct PageState {
    current: Option<Document>,
    history: Vec<Document>,
}

pub struct HttpPage {
    client: Client,
    base_url: Url,
    state: Mutex<PageState>,
}

/// What a click on an element would do.
enum ClickTarget {
    Navigate(String),
    Inert,
}

impl HttpPage {
    fn resolve(&self, href: &str) -> String {
        resolve_url(&self.base_url, href)
    }

    async fn fetch(&self, url: &str) -> Result<Document> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api(url, format!("status {}", status.as_u16())));
        }
        let url = response.url().clone();
        let html = response.text().await?;
        Ok(Document { url, html })
    }

    async fn current_html(&self) -> String {
        let state = self.state.lock().await;
        state
            .current
            .as_ref()
            .map(|doc| doc.html.clone())
            .unwrap_or_default()
    }

    async fn current_url(&self) -> Url {
        let state = self.state.lock().await;
        state
            .current
            .as_ref()
            .map(|doc| doc.url.clone())
            .unwrap_or_else(|| self.base_url.clone())
    }

    /// Run a query against the parsed current document. `Html` is not
    /// `Send`, so it never lives across an await.
    async fn query<T>(
        &self,
        selector: &str,
        f: impl FnOnce(&Html, &Selector) -> T,
    ) -> Result<T> {
        let selector = parse_selector(selector)?;
        let html = self.current_html().await;
        let document = Html::parse_document(&html);
        Ok(f(&document, &selector))
    }

    async fn click_target(&self, selector: &str, nth: usize) -> Result<ClickTarget> {
        let base = self.current_url().await;
        let found = self
            .query(selector, |doc, sel| {
                doc.select(sel).nth(nth).map(|element| {
                    let value = element.value();
                    [value.attr("href"), value.attr("data-url")]
                        .into_iter()
                        .flatten()
                        .map(str::trim)
                        .find(|href| is_followable(href))
                        .map(|href| resolve_url(&base, href))
                })
            })
            .await?;

        match found {
            None => Err(AppError::crawl(
                "click",
                format!("no element #{nth} for {selector}"),
            )),
            Some(Some(url)) => Ok(ClickTarget::Navigate(url)),
            Some(None) => Ok(ClickTarget::Inert),
        }
    }
}

fn is_followable(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:")
}

#[async_trait]
impl Page for HttpPage {
    async fn post_json(
        &self,
        url: &str,
        body: &Map<String, Value>,
        headers: &BTreeMap<String, String>,
    ) -> Result<ApiResponse> {
        let mut request = self.client.post(self.resolve(url)).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(ApiResponse { status, body })
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let document = self.fetch(&self.resolve(url)).await?;
        let mut state = self.state.lock().await;
        if let Some(previous) = state.current.replace(document) {
            state.history.push(previous);
        }
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.current_html().await)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.query(selector, |doc, sel| doc.select(sel).count()).await
    }

    async fn inner_text(&self, selector: &str, nth: usize) -> Result<Option<String>> {
        self.query(selector, |doc, sel| {
            doc.select(sel)
                .nth(nth)
                .map(|element| element.text().collect::<String>().trim().to_string())
        })
        .await
    }

    async fn attribute(&self, selector: &str, nth: usize, name: &str) -> Result<Option<String>> {
        self.query(selector, |doc, sel| {
            doc.select(sel)
                .nth(nth)
                .and_then(|element| element.value().attr(name).map(str::to_string))
        })
        .await
    }

    async fn click(&self, selector: &str, nth: usize) -> Result<()> {
        match self.click_target(selector, nth).await? {
            ClickTarget::Navigate(url) => self.goto(&url).await,
            ClickTarget::Inert => {
                log::debug!("{selector}[{nth}] has no link to follow");
                Ok(())
            }
        }
    }

    async fn click_expect_json(
        &self,
        selector: &str,
        nth: usize,
        url_fragment: &str,
    ) -> Result<Option<Value>> {
        match self.click_target(selector, nth).await? {
            ClickTarget::Navigate(url) if url.contains(url_fragment) => {
                let document = self.fetch(&url).await?;
                Ok(Some(serde_json::from_str(&document.html)?))
            }
            ClickTarget::Navigate(url) => {
                self.goto(&url).await?;
                Ok(None)
            }
            ClickTarget::Inert => Ok(None),
        }
    }

    async fn go_back(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.history.pop() {
            Some(previous) => {
                state.current = Some(previous);
                Ok(())
            }
            None => Err(AppError::crawl("go_back", "no previous page")),
        }
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        // Static documents do not change; one look is enough.
        Ok(self.count(selector).await? > 0)
    }

    async fn wait_for_load_state(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(html: &str) -> HttpPage {
        let session = HttpSession::open(&Config::default()).unwrap();
        let page = session.new_page();
        session.close();
        let url = Url::parse("https://www.g2b.go.kr/list.do").unwrap();
        page.state.try_lock().unwrap().current = Some(Document {
            url,
            html: html.to_string(),
        });
        page
    }

    const HTML: &str = r##"
        <ul>
          <li class="row"><a href="detail.do?no=1">첫 공고</a></li>
          <li class="row"><a href="#" data-url="/api/detail.do?no=2">둘째</a></li>
          <li class="row"><a href="javascript:void(0)">셋째</a></li>
        </ul>
    "##;

    #[tokio::test]
    async fn test_selector_queries() {
        let page = page_with(HTML);
        assert_eq!(page.count("li.row").await.unwrap(), 3);
        assert_eq!(
            page.inner_text("li.row a", 0).await.unwrap().as_deref(),
            Some("첫 공고")
        );
        assert_eq!(
            page.attribute("li.row a", 1, "data-url").await.unwrap().as_deref(),
            Some("/api/detail.do?no=2")
        );
        assert_eq!(page.inner_text("li.row a", 9).await.unwrap(), None);
        assert!(!page.wait_for_selector("table", Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn test_click_targets() {
        let page = page_with(HTML);
        match page.click_target("li.row a", 0).await.unwrap() {
            ClickTarget::Navigate(url) => {
                assert_eq!(url, "https://www.g2b.go.kr/detail.do?no=1")
            }
            ClickTarget::Inert => panic!("expected a link"),
        }
        match page.click_target("li.row a", 1).await.unwrap() {
            ClickTarget::Navigate(url) => {
                assert_eq!(url, "https://www.g2b.go.kr/api/detail.do?no=2")
            }
            ClickTarget::Inert => panic!("expected the data-url"),
        }
        assert!(matches!(
            page.click_target("li.row a", 2).await.unwrap(),
            ClickTarget::Inert
        ));
        assert!(page.click_target("li.row a", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_go_back_without_history_fails() {
        let page = page_with(HTML);
        assert!(page.go_back().await.is_err());
    }
}
