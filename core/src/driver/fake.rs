//! In-memory page model implementing [`Driver`].
//!
//! Used to exercise the executor, oracle and runner without a browser.
//! Time is measured with `tokio::time`, so tests can run with a paused clock.

use super::{require_single, Driver, ElementHandle, SessionFactory};
use crate::error::{CaptureError, StepError};
use crate::locale;
use crate::scenario::Selector;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const PLACEHOLDER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeElement {
    pub role: String,
    pub label: Option<String>,
    pub name: String,
    pub options: Vec<String>,
    pub value: Option<String>,
    pub checked: bool,
    pub hidden: bool,
    /// Interactions with this element never settle.
    pub stalls: bool,
}

impl FakeElement {
    pub fn button(name: impl Into<String>) -> Self {
        Self {
            role: "button".to_string(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn checkbox(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            role: "checkbox".to_string(),
            name: label.clone(),
            label: Some(label),
            ..Self::default()
        }
    }

    pub fn select(label: impl Into<String>, options: &[&str], value: &str) -> Self {
        let label = label.into();
        Self {
            role: "combobox".to_string(),
            name: label.clone(),
            label: Some(label),
            options: options.iter().map(|o| o.to_string()).collect(),
            value: Some(value.to_string()),
            ..Self::default()
        }
    }

    pub fn stalling(mut self) -> Self {
        self.stalls = true;
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        if self.hidden {
            return false;
        }
        match selector {
            Selector::Label { text } => self.label.as_deref() == Some(text.as_str()),
            Selector::Role { role, name } => &self.role == role && &self.name == name,
            Selector::Text { text } => &self.name == text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Selected { label: String, value: String },
    Checked { label: String },
    Clicked { name: String },
}

#[derive(Debug, Clone)]
struct RenderedText {
    text: String,
    visible_from: Instant,
}

#[derive(Debug, Default)]
pub struct FakeDom {
    elements: Vec<FakeElement>,
    rendered: Vec<RenderedText>,
}

impl FakeDom {
    pub fn add_element(&mut self, element: FakeElement) {
        self.elements.push(element);
    }

    pub fn render(&mut self, text: impl Into<String>, delay: Duration) {
        self.rendered.push(RenderedText {
            text: text.into(),
            visible_from: Instant::now() + delay,
        });
    }

    pub fn clear(&mut self, text: &str) {
        self.rendered.retain(|rendered| !rendered.text.contains(text));
    }

    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|el| el.label.as_deref() == Some(label))
            .and_then(|el| el.value.as_deref())
    }

    fn text_visible(&self, text: &str) -> bool {
        let now = Instant::now();
        self.rendered
            .iter()
            .any(|rendered| rendered.visible_from <= now && rendered.text.contains(text))
    }
}

pub type Reaction = Arc<dyn Fn(&Interaction, &mut FakeDom) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| !entry.starts_with("probe "))
            .collect()
    }
}

pub struct FakePage {
    dom: FakeDom,
    reactions: Vec<Reaction>,
    journal: Journal,
    url: Option<String>,
    ready: bool,
    navigation_timeout: Duration,
    interaction_timeout: Duration,
    fail_screenshots: bool,
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            dom: FakeDom::default(),
            reactions: Vec::new(),
            journal: Journal::default(),
            url: None,
            ready: true,
            navigation_timeout: Duration::from_secs(30),
            interaction_timeout: Duration::from_secs(10),
            fail_screenshots: false,
        }
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.dom.add_element(element);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.dom.render(text, Duration::ZERO);
        self
    }

    pub fn on(
        mut self,
        reaction: impl Fn(&Interaction, &mut FakeDom) + Send + Sync + 'static,
    ) -> Self {
        self.reactions.push(Arc::new(reaction));
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    pub fn with_timeouts(mut self, navigation: Duration, interaction: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.interaction_timeout = interaction;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The payment-schedule calculator as the built-in scenarios see it.
    ///
    /// Translated glyphs appear `render_delay` after the triggering click.
    pub fn calculator(render_delay: Duration) -> Self {
        const LANGUAGE: &str = "Language for Written Amounts";
        const SPLIT: &str = "Split First Year Payments?";
        const ADD: &str = "+ Add Payment";
        const CALCULATE: &str = "Calculate (Generate Plan)";

        FakePage::new()
            .with_element(FakeElement::select(LANGUAGE, &["en", "ar"], "en"))
            .with_element(FakeElement::checkbox(SPLIT))
            .with_element(FakeElement::button(CALCULATE))
            .with_text(LANGUAGE)
            .with_text(SPLIT)
            .with_text(CALCULATE)
            .on(move |interaction, dom| {
                let language = dom
                    .value_of(LANGUAGE)
                    .and_then(locale::lookup)
                    .unwrap_or(&locale::ENGLISH);
                match interaction {
                    Interaction::Checked { label } if label == SPLIT => {
                        dom.add_element(FakeElement::button(ADD));
                        dom.render(ADD, Duration::ZERO);
                    }
                    Interaction::Clicked { name } if name == ADD => {
                        dom.render("Month (1-12)", Duration::ZERO);
                        if language.is_rtl() {
                            if let Some(month) = language.month(locale::DEFAULT_MONTH) {
                                dom.render(month, render_delay);
                            }
                        }
                    }
                    Interaction::Clicked { name } if name == CALCULATE => {
                        dom.render("Written Amount", Duration::ZERO);
                        let written = match language.amount_marker {
                            Some(marker) => format!("{marker} مائة ألف جنيه مصري لا غير"),
                            None => "one hundred thousand Egyptian pounds".to_string(),
                        };
                        dom.render(written, render_delay);
                    }
                    _ => {}
                }
            })
    }

    fn react(&mut self, interaction: Interaction) {
        for reaction in &self.reactions {
            reaction(&interaction, &mut self.dom);
        }
    }

    fn element(&self, handle: &ElementHandle) -> Result<usize, StepError> {
        let index: usize = handle
            .token()
            .parse()
            .map_err(|_| StepError::browser(format!("foreign handle {}", handle.token())))?;
        match self.dom.elements.get(index) {
            Some(el) if el.matches(handle.selector()) => Ok(index),
            _ => Err(StepError::ElementNotFound {
                selector: handle.selector().to_string(),
            }),
        }
    }

    async fn settle(&self, index: usize, action: String) -> Result<(), StepError> {
        if self.dom.elements[index].stalls {
            tokio::time::sleep(self.interaction_timeout).await;
            return Err(StepError::InteractionTimeout {
                action,
                timeout: self.interaction_timeout,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), StepError> {
        self.journal.push(format!("navigate {url}"));
        if !self.ready {
            tokio::time::sleep(self.navigation_timeout).await;
            return Err(StepError::NavigationTimeout {
                url: url.to_string(),
                timeout: self.navigation_timeout,
            });
        }
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn locate(&mut self, selector: &Selector) -> Result<ElementHandle, StepError> {
        self.journal.push(format!("locate {selector}"));
        let matches: Vec<usize> = self
            .dom
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.matches(selector))
            .map(|(idx, _)| idx)
            .collect();
        require_single(selector, matches.len())?;
        Ok(ElementHandle::new(selector.clone(), matches[0].to_string()))
    }

    async fn select_option(
        &mut self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<(), StepError> {
        self.journal
            .push(format!("select {value} in {}", handle.selector()));
        let index = self.element(handle)?;
        let element = &mut self.dom.elements[index];
        if !element.options.iter().any(|option| option == value) {
            return Err(StepError::browser(format!(
                "{} has no option {value:?}",
                handle.selector()
            )));
        }
        element.value = Some(value.to_string());
        let label = element.label.clone().unwrap_or_default();
        self.settle(index, format!("selecting {value:?}")).await?;
        self.react(Interaction::Selected {
            label,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn check(&mut self, handle: &ElementHandle) -> Result<(), StepError> {
        self.journal.push(format!("check {}", handle.selector()));
        let index = self.element(handle)?;
        self.settle(index, format!("checking {}", handle.selector()))
            .await?;
        let element = &mut self.dom.elements[index];
        if element.checked {
            return Ok(());
        }
        element.checked = true;
        let label = element.label.clone().unwrap_or_default();
        self.react(Interaction::Checked { label });
        Ok(())
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), StepError> {
        self.journal.push(format!("click {}", handle.selector()));
        let index = self.element(handle)?;
        self.settle(index, format!("clicking {}", handle.selector()))
            .await?;
        let name = self.dom.elements[index].name.clone();
        self.react(Interaction::Clicked { name });
        Ok(())
    }

    async fn text_visible(&mut self, text: &str) -> Result<bool, StepError> {
        self.journal.push(format!("probe {text}"));
        Ok(self.dom.text_visible(text))
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), CaptureError> {
        self.journal.push(format!("screenshot {}", path.display()));
        if self.fail_screenshots {
            return Err(CaptureError {
                path: path.to_path_buf(),
                reason: "renderer unavailable".to_string(),
            });
        }
        tokio::fs::write(path, PLACEHOLDER_PNG)
            .await
            .map_err(|err| CaptureError {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), StepError> {
        self.journal.push("close".to_string());
        Ok(())
    }
}

pub struct FakeSessionFactory {
    build: Box<dyn Fn() -> FakePage + Send + Sync>,
    journal: Journal,
}

impl FakeSessionFactory {
    pub fn new(build: impl Fn() -> FakePage + Send + Sync + 'static) -> Self {
        Self {
            build: Box::new(build),
            journal: Journal::default(),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self) -> Result<Box<dyn Driver>, StepError> {
        let page = (self.build)().with_journal(self.journal.clone());
        Ok(Box::new(page))
    }
}
