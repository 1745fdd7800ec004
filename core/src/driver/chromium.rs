//! Chromium session over the DevTools protocol.
//!
//! Elements are resolved in page script by accessible label, role + name or
//! visible text, and tagged with a one-shot `data-glyphcheck-handle`
//! attribute. The tag is replaced on every `locate`, so a handle never
//! outlives the step that produced it.

use super::{require_single, Driver, ElementHandle, SessionFactory};
use crate::config::HarnessConfig;
use crate::error::{CaptureError, StepError};
use crate::scenario::Selector;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const HANDLE_ATTR: &str = "data-glyphcheck-handle";

const LOCATE_SCRIPT: &str = r#"(selector) => {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  const controls = 'input, select, textarea, button, [role]';
  const implicitRoles = {
    button: 'button, input[type=button], input[type=submit], input[type=reset]',
    checkbox: 'input[type=checkbox]',
    radio: 'input[type=radio]',
    combobox: 'select',
    link: 'a[href]',
    textbox: 'input:not([type]), input[type=text], input[type=number], textarea',
  };
  // Label text without the text of any control nested inside it.
  const ownText = (node) => {
    const copy = node.cloneNode(true);
    copy.querySelectorAll('input, select, textarea, button').forEach((c) => c.remove());
    return norm(copy.textContent);
  };
  const labelName = (el) => {
    const ids = el.getAttribute('aria-labelledby');
    if (ids) {
      return norm(ids.split(/\s+/)
        .map((id) => document.getElementById(id))
        .filter(Boolean)
        .map((node) => node.textContent)
        .join(' '));
    }
    const aria = el.getAttribute('aria-label');
    if (aria) return norm(aria);
    if (el.labels && el.labels.length) return norm([...el.labels].map(ownText).join(' '));
    return '';
  };
  const isField = (el) =>
    ['SELECT', 'TEXTAREA'].includes(el.tagName) ||
    (el.tagName === 'INPUT' && !['button', 'submit', 'reset'].includes(el.type));
  const accessibleName = (el) => {
    const labelled = labelName(el);
    if (labelled) return labelled;
    if (isField(el)) return '';
    if (el.tagName === 'INPUT') return norm(el.value);
    return norm(el.textContent);
  };
  let candidates = [];
  if (selector.by === 'label') {
    const target = norm(selector.text);
    candidates = [...document.querySelectorAll(controls)].filter((el) => labelName(el) === target);
  } else if (selector.by === 'role') {
    const query = ['[role="' + selector.role + '"]', implicitRoles[selector.role]].filter(Boolean).join(', ');
    const target = norm(selector.name);
    candidates = [...document.querySelectorAll(query)].filter((el) => accessibleName(el) === target);
  } else {
    const target = norm(selector.text);
    candidates = [...document.querySelectorAll('a, summary, ' + controls)]
      .filter((el) => accessibleName(el) === target);
  }
  candidates = candidates.filter(visible);
  document.querySelectorAll('[data-glyphcheck-handle]').forEach((el) => el.removeAttribute('data-glyphcheck-handle'));
  const token = 'h' + Date.now().toString(36) + Math.random().toString(36).slice(2, 8);
  if (candidates.length === 1) candidates[0].setAttribute('data-glyphcheck-handle', token);
  return { count: candidates.length, token };
}"#;

const SELECT_SCRIPT: &str = r#"(token, value) => {
  const el = document.querySelector('[data-glyphcheck-handle="' + token + '"]');
  if (!el) return 'detached';
  if (el.tagName !== 'SELECT') return 'element is not a select';
  const option = [...el.options].find((o) => o.value === value || o.label.trim() === value);
  if (!option) return 'no option ' + JSON.stringify(value);
  const setter = Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set;
  setter.call(el, option.value);
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return null;
}"#;

const CHECKED_SCRIPT: &str = r#"(token) => {
  const el = document.querySelector('[data-glyphcheck-handle="' + token + '"]');
  if (!el) return null;
  return el.checked === true || el.getAttribute('aria-checked') === 'true';
}"#;

const SETTLE_SCRIPT: &str = r#"(quietMs) => new Promise((resolve) => {
  const done = () => { observer.disconnect(); resolve(true); };
  let timer = setTimeout(done, quietMs);
  const observer = new MutationObserver(() => {
    clearTimeout(timer);
    timer = setTimeout(done, quietMs);
  });
  observer.observe(document.documentElement, { subtree: true, childList: true, attributes: true, characterData: true });
})"#;

const TEXT_VISIBLE_SCRIPT: &str =
    r#"(needle) => !!document.body && document.body.innerText.includes(needle)"#;

const READY_SCRIPT: &str = r#"() => document.readyState"#;

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    config: HarnessConfig,
    profile_root: PathBuf,
}

impl ChromiumSessionFactory {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            profile_root: std::env::temp_dir(),
        }
    }

    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    fn profile_dir(&self) -> PathBuf {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.profile_root.join(format!("glyphcheck-{}-{id}", std::process::id()))
    }

    async fn launch(&self, profile: &Path) -> Result<ChromiumSession, StepError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.navigation_timeout())
            .user_data_dir(profile);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(StepError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(StepError::browser)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(%err, "cdp handler stopped");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(StepError::browser(err));
            }
        };

        Ok(ChromiumSession {
            browser,
            page,
            handler_task,
            profile: profile.to_path_buf(),
            navigation_timeout: self.config.navigation_timeout(),
            interaction_timeout: self.config.interaction_timeout(),
            settle_quiet: self.config.settle_quiet(),
        })
    }
}

async fn remove_profile(profile: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(profile).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            debug!(%err, profile = %profile.display(), "profile cleanup skipped");
        }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn Driver>, StepError> {
        let profile = self.profile_dir();
        match self.launch(&profile).await {
            Ok(session) => {
                debug!(profile = %profile.display(), "browser session opened");
                Ok(Box::new(session))
            }
            Err(err) => {
                remove_profile(&profile).await;
                Err(err)
            }
        }
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile: PathBuf,
    navigation_timeout: Duration,
    interaction_timeout: Duration,
    settle_quiet: Duration,
}

#[derive(Debug, Deserialize)]
struct LocateResult {
    count: usize,
    token: String,
}

async fn call<T: DeserializeOwned>(
    page: &Page,
    script: &str,
    args: &[serde_json::Value],
) -> Result<T, StepError> {
    let rendered_args = args
        .iter()
        .map(serde_json::Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let expression = ["(", script, ")(", &rendered_args, ")"].concat();
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(StepError::Browser)?;
    page.evaluate_expression(params)
        .await
        .map_err(StepError::browser)?
        .into_value::<T>()
        .map_err(StepError::browser)
}

async fn tagged_element(page: &Page, handle: &ElementHandle) -> Result<Element, StepError> {
    let css = format!("[{HANDLE_ATTR}=\"{}\"]", handle.token());
    page.find_element(css)
        .await
        .map_err(|_| StepError::ElementNotFound {
            selector: handle.selector().to_string(),
        })
}

/// Runs an interaction, then waits for a quiet DOM, all within `timeout`.
async fn interact<F>(
    page: &Page,
    quiet: Duration,
    timeout: Duration,
    action: String,
    interaction: F,
) -> Result<(), StepError>
where
    F: Future<Output = Result<(), StepError>> + Send,
{
    let run = async {
        interaction.await?;
        let quiet_ms = serde_json::json!(quiet.as_millis() as u64);
        call::<bool>(page, SETTLE_SCRIPT, &[quiet_ms]).await.map(|_| ())
    };
    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => Err(StepError::InteractionTimeout { action, timeout }),
    }
}

#[async_trait]
impl Driver for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), StepError> {
        let page = &self.page;
        let timeout = self.navigation_timeout;
        let load = async {
            page.goto(url).await.map_err(StepError::browser)?;
            loop {
                let state: String = call(page, READY_SCRIPT, &[]).await?;
                if state == "complete" {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(StepError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn locate(&mut self, selector: &Selector) -> Result<ElementHandle, StepError> {
        let arg = serde_json::to_value(selector).map_err(StepError::browser)?;
        let result: LocateResult = call(&self.page, LOCATE_SCRIPT, &[arg]).await?;
        require_single(selector, result.count)?;
        Ok(ElementHandle::new(selector.clone(), result.token))
    }

    async fn select_option(
        &mut self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<(), StepError> {
        let page = &self.page;
        let args = [serde_json::json!(handle.token()), serde_json::json!(value)];
        let action = format!("selecting {value:?} in {}", handle.selector());
        let select = async {
            let problem: Option<String> = call(page, SELECT_SCRIPT, &args).await?;
            match problem.as_deref() {
                None => Ok(()),
                Some("detached") => Err(StepError::ElementNotFound {
                    selector: handle.selector().to_string(),
                }),
                Some(problem) => Err(StepError::Browser(format!(
                    "{}: {problem}",
                    handle.selector()
                ))),
            }
        };
        interact(page, self.settle_quiet, self.interaction_timeout, action, select).await
    }

    async fn check(&mut self, handle: &ElementHandle) -> Result<(), StepError> {
        let page = &self.page;
        let action = format!("checking {}", handle.selector());
        let toggle = async {
            let checked: Option<bool> =
                call(page, CHECKED_SCRIPT, &[serde_json::json!(handle.token())]).await?;
            match checked {
                None => Err(StepError::ElementNotFound {
                    selector: handle.selector().to_string(),
                }),
                Some(true) => Ok(()),
                Some(false) => {
                    let element = tagged_element(page, handle).await?;
                    element.click().await.map_err(StepError::browser)?;
                    Ok(())
                }
            }
        };
        interact(page, self.settle_quiet, self.interaction_timeout, action, toggle).await
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), StepError> {
        let page = &self.page;
        let action = format!("clicking {}", handle.selector());
        let press = async {
            let element = tagged_element(page, handle).await?;
            element.click().await.map_err(StepError::browser)?;
            Ok(())
        };
        interact(page, self.settle_quiet, self.interaction_timeout, action, press).await
    }

    async fn text_visible(&mut self, text: &str) -> Result<bool, StepError> {
        call(&self.page, TEXT_VISIBLE_SCRIPT, &[serde_json::json!(text)]).await
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), CaptureError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(|err| CaptureError {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), StepError> {
        let closed = self.browser.close().await.map(|_| ());
        if let Err(err) = self.browser.wait().await {
            warn!(%err, "browser process did not exit cleanly");
        }
        self.handler_task.abort();
        remove_profile(&self.profile).await;
        closed.map_err(StepError::browser)
    }
}
