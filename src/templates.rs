//! Offline code generation from recorded actions, without any model call.
//!
//! Output is a starting point: one statement per action using the most
//! stable selector the inspector captured.

use std::fmt::Write as _;

use crate::framework::FrameworkDescriptor;
use crate::types::{Action, ActionType, GenerationRequest};

/// Template generation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// No template exists for the framework.
    #[error("no offline template for framework '{0}'")]
    UnsupportedFramework(String),
    /// Nothing to render.
    #[error("the request contains no recorded actions")]
    NoActions,
}

/// Framework ids with an offline template.
pub const TEMPLATE_FRAMEWORKS: [&str; 4] = ["selenium-python", "playwright-js", "cypress", "cucumber"];

/// Render a request into framework source code.
///
/// # Errors
///
/// Returns [`TemplateError`] when the framework has no template or the
/// request has no actions.
pub fn render(
    request: &GenerationRequest,
    framework: &FrameworkDescriptor,
    include_comments: bool,
) -> Result<String, TemplateError> {
    if request.actions.is_empty() {
        return Err(TemplateError::NoActions);
    }
    let url = request
        .page_context
        .as_ref()
        .map(|page| page.url.as_str())
        .filter(|url| !url.is_empty());

    match framework.id {
        "selenium-python" => Ok(selenium_python(request, url, include_comments)),
        "playwright-js" => Ok(playwright_js(request, url, include_comments)),
        "cypress" => Ok(cypress(request, url, include_comments)),
        "cucumber" => Ok(cucumber(request, url)),
        other => Err(TemplateError::UnsupportedFramework(other.to_owned())),
    }
}

/// Double-quoted string literal valid in Python, JavaScript and Gherkin.
fn quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

/// Text safe inside a Python `"""` docstring: every quote is escaped, so no
/// run of quotes can close it early or merge with the closing delimiter.
fn docstring_body(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn step_comment(action: &Action, number: usize) -> String {
    let description = action.description.trim();
    if description.is_empty() {
        format!("Step {number}: {} {}", action.kind, action.target_element.tag)
    } else {
        format!("Step {number}: {description}")
    }
}

fn value_of(action: &Action) -> &str {
    action.value.as_deref().unwrap_or_default()
}

fn selenium_python(request: &GenerationRequest, url: Option<&str>, comments: bool) -> String {
    let mut out = String::from(
        "import pytest\n\
         from selenium import webdriver\n\
         from selenium.webdriver.common.action_chains import ActionChains\n\
         from selenium.webdriver.common.by import By\n\
         from selenium.webdriver.support import expected_conditions as EC\n\
         from selenium.webdriver.support.ui import Select, WebDriverWait\n\
         \n\
         \n\
         @pytest.fixture\n\
         def driver():\n    driver = webdriver.Chrome()\n    yield driver\n    driver.quit()\n\
         \n\
         \n\
         def test_recorded_scenario(driver):\n",
    );
    if let Some(scenario) = request.scenario() {
        let _ = writeln!(out, "    \"\"\"{}\"\"\"", docstring_body(scenario));
    }
    if let Some(url) = url {
        let _ = writeln!(out, "    driver.get({})", quote(url));
    }
    let _ = writeln!(out, "    wait = WebDriverWait(driver, 10)");

    for (index, action) in request.actions.iter().enumerate() {
        let _ = writeln!(out);
        if comments {
            let _ = writeln!(out, "    # {}", step_comment(action, index.saturating_add(1)));
        }
        let locator = format!(
            "(By.CSS_SELECTOR, {})",
            quote(&action.target_element.best_selector())
        );
        let value = quote(value_of(action));
        match action.kind {
            ActionType::Click => {
                let _ = writeln!(
                    out,
                    "    wait.until(EC.element_to_be_clickable({locator})).click()"
                );
            }
            ActionType::Type => {
                let _ = writeln!(
                    out,
                    "    field = wait.until(EC.visibility_of_element_located({locator}))"
                );
                let _ = writeln!(out, "    field.clear()");
                let _ = writeln!(out, "    field.send_keys({value})");
            }
            ActionType::Select => {
                let _ = writeln!(
                    out,
                    "    Select(wait.until(EC.presence_of_element_located({locator}))).select_by_visible_text({value})"
                );
            }
            ActionType::Hover => {
                let _ = writeln!(
                    out,
                    "    target = wait.until(EC.visibility_of_element_located({locator}))"
                );
                let _ = writeln!(out, "    ActionChains(driver).move_to_element(target).perform()");
            }
            ActionType::Wait => {
                let _ = writeln!(out, "    wait.until(EC.visibility_of_element_located({locator}))");
            }
            ActionType::Assert => {
                let _ = writeln!(
                    out,
                    "    element = wait.until(EC.visibility_of_element_located({locator}))"
                );
                if value_of(action).is_empty() {
                    let _ = writeln!(out, "    assert element.is_displayed()");
                } else {
                    let _ = writeln!(out, "    assert {value} in element.text");
                }
            }
        }
    }
    out
}

fn playwright_js(request: &GenerationRequest, url: Option<&str>, comments: bool) -> String {
    let mut out = String::from("const { test, expect } = require('@playwright/test');\n\n");
    let title = quote(request.scenario().unwrap_or("recorded scenario"));
    let _ = writeln!(out, "test({title}, async ({{ page }}) => {{");
    if let Some(url) = url {
        let _ = writeln!(out, "  await page.goto({});", quote(url));
    }

    for (index, action) in request.actions.iter().enumerate() {
        if comments {
            let _ = writeln!(out, "  // {}", step_comment(action, index.saturating_add(1)));
        }
        let locator = format!(
            "page.locator({})",
            quote(&action.target_element.best_selector())
        );
        let value = quote(value_of(action));
        let line = match action.kind {
            ActionType::Click => format!("await {locator}.click();"),
            ActionType::Type => format!("await {locator}.fill({value});"),
            ActionType::Select => format!("await {locator}.selectOption({value});"),
            ActionType::Hover => format!("await {locator}.hover();"),
            ActionType::Wait => format!("await {locator}.waitFor();"),
            ActionType::Assert if value_of(action).is_empty() => {
                format!("await expect({locator}).toBeVisible();")
            }
            ActionType::Assert => format!("await expect({locator}).toContainText({value});"),
        };
        let _ = writeln!(out, "  {line}");
    }
    out.push_str("});\n");
    out
}

fn cypress(request: &GenerationRequest, url: Option<&str>, comments: bool) -> String {
    let mut out = String::new();
    let title = quote(request.scenario().unwrap_or("Recorded scenario"));
    let _ = writeln!(out, "describe({title}, () => {{");
    let _ = writeln!(out, "  it('performs the recorded actions', () => {{");
    if let Some(url) = url {
        let _ = writeln!(out, "    cy.visit({});", quote(url));
    }

    for (index, action) in request.actions.iter().enumerate() {
        if comments {
            let _ = writeln!(out, "    // {}", step_comment(action, index.saturating_add(1)));
        }
        let target = format!("cy.get({})", quote(&action.target_element.best_selector()));
        let value = quote(value_of(action));
        let line = match action.kind {
            ActionType::Click => format!("{target}.click();"),
            ActionType::Type => format!("{target}.clear().type({value});"),
            ActionType::Select => format!("{target}.select({value});"),
            ActionType::Hover => format!("{target}.trigger('mouseover');"),
            ActionType::Wait => format!("{target}.should('exist');"),
            ActionType::Assert if value_of(action).is_empty() => {
                format!("{target}.should('be.visible');")
            }
            ActionType::Assert => format!("{target}.should('contain', {value});"),
        };
        let _ = writeln!(out, "    {line}");
    }
    out.push_str("  });\n});\n");
    out
}

fn cucumber(request: &GenerationRequest, url: Option<&str>) -> String {
    let scenario = request.scenario().unwrap_or("Recorded scenario");
    let mut out = String::new();
    let _ = writeln!(out, "Feature: {scenario}");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Scenario: {scenario}");
    match url {
        Some(url) => {
            let _ = writeln!(out, "    Given I am on {}", quote(url));
        }
        None => {
            let _ = writeln!(out, "    Given I am on the page under test");
        }
    }

    let mut previous: Option<&str> = None;
    for action in &request.actions {
        let element = &action.target_element;
        let label = quote(
            element
                .text()
                .or_else(|| element.attribute("aria-label"))
                .or_else(|| element.id())
                .unwrap_or(element.css_selector.as_str()),
        );
        let value = quote(value_of(action));
        let keyword = if action.kind == ActionType::Assert {
            "Then"
        } else {
            "When"
        };
        let shown = if previous == Some(keyword) { "And" } else { keyword };
        previous = Some(keyword);

        let step = match action.kind {
            ActionType::Click => format!("I click on {label}"),
            ActionType::Type => format!("I type {value} into {label}"),
            ActionType::Select => format!("I select {value} from {label}"),
            ActionType::Hover => format!("I hover over {label}"),
            ActionType::Wait => format!("I wait for {label} to appear"),
            ActionType::Assert if value_of(action).is_empty() => format!("I should see {label}"),
            ActionType::Assert => format!("{label} should contain {value}"),
        };
        let _ = writeln!(out, "    {shown} {step}");
    }
    out
}
