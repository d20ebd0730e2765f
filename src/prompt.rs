//! Prompt rendering for test generation.
//!
//! [`build_prompt`] is a pure function: identical inputs always render the
//! identical string. Optional blocks (page context, element position,
//! accessibility) are left out entirely when their data is missing.

use std::fmt::Write as _;

use crate::framework::FrameworkDescriptor;
use crate::types::{ElementDescriptor, GenerationRequest};

/// Scenario text used when the request carries none.
pub const DEFAULT_SCENARIO: &str =
    "Create a test that performs the recorded actions and verifies the expected behavior.";

/// Maximum characters of element text included per action.
pub const MAX_TEXT_CHARS: usize = 100;

/// Settings-derived switches that shape the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PromptOptions {
    /// Ask for explanatory comments in the generated code.
    pub include_comments: bool,
    /// Ask for the Page Object Model pattern.
    pub use_page_object_model: bool,
}

/// System message sent to chat-style providers.
pub fn system_prompt(framework: &FrameworkDescriptor) -> String {
    format!(
        "You are an expert test automation engineer. You write clean, reliable {} tests in {}. You respond with source code only.",
        framework.display_name, framework.language
    )
}

/// Render a generation request into a single prompt string.
pub fn build_prompt(
    request: &GenerationRequest,
    framework: &FrameworkDescriptor,
    options: PromptOptions,
) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail; results are ignored throughout.
    let _ = writeln!(
        out,
        "Generate a {} test for the following scenario.",
        framework.display_name
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Scenario: {}",
        request.scenario().unwrap_or(DEFAULT_SCENARIO)
    );

    if let Some(page) = &request.page_context {
        let _ = writeln!(out);
        let _ = writeln!(out, "Page Context:");
        let _ = writeln!(out, "- URL: {}", page.url);
        let _ = writeln!(out, "- Title: {}", page.title);
        let _ = writeln!(out, "- Elements on page: {}", page.element_count);
    }

    if !request.actions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Actions to perform:");
        for (index, action) in request.actions.iter().enumerate() {
            let number = index.saturating_add(1);
            let _ = write!(out, "{number}. {} on <{}>", action.kind, action.target_element.tag);
            if !action.description.trim().is_empty() {
                let _ = write!(out, ": {}", action.description.trim());
            }
            let _ = writeln!(out);
            if let Some(value) = action.value.as_deref().filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "   - Value: \"{value}\"");
            }
            write_element_details(&mut out, &action.target_element);
        }
    } else if !request.elements.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Selected elements:");
        for element in &request.elements {
            let _ = writeln!(out, "- <{}> {}", element.tag, element.best_selector());
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Requirements:");
    let _ = writeln!(
        out,
        "- Use reliable selectors (prefer IDs and data-testid attributes, then CSS selectors, XPath last)"
    );
    let _ = writeln!(
        out,
        "- Add explicit waits to handle race conditions and dynamically loaded content"
    );
    let _ = writeln!(
        out,
        "- Include meaningful assertions that verify the expected outcome"
    );
    let _ = writeln!(out, "- Handle errors and failures gracefully");
    let _ = writeln!(
        out,
        "- Follow {} conventions and best practices",
        framework.display_name
    );
    let _ = writeln!(out, "- Keep the test independent and repeatable");
    if options.include_comments {
        let _ = writeln!(out, "- Include clear comments explaining each step");
    }
    if options.use_page_object_model {
        let _ = writeln!(
            out,
            "- Use the Page Object Model pattern, with page classes separate from test logic"
        );
    }

    let _ = writeln!(out);
    let _ = write!(
        out,
        "Return ONLY the {} code. Do not include explanations, prose, or markdown code fences.",
        framework.language
    );

    out
}

fn write_element_details(out: &mut String, element: &ElementDescriptor) {
    let _ = writeln!(out, "   - Tag: {}", element.tag);
    if let Some(id) = element.id() {
        let _ = writeln!(out, "   - ID: {id}");
    }
    if !element.classes.is_empty() {
        let _ = writeln!(out, "   - Classes: {}", element.classes.join(" "));
    }
    if !element.css_selector.is_empty() {
        let _ = writeln!(out, "   - CSS Selector: {}", element.css_selector);
    }
    if let Some(test_id) = element.attribute("data-testid") {
        let _ = writeln!(out, "   - Test ID: {test_id}");
    }
    if let Some(text) = element.text() {
        let _ = writeln!(out, "   - Text: \"{}\"", truncate_chars(text, MAX_TEXT_CHARS));
    }
    if !element.xpath.is_empty() {
        let _ = writeln!(out, "   - XPath: {}", element.xpath);
    }

    if let Some(rect) = &element.rect {
        let _ = writeln!(
            out,
            "   - Position: x={:.0}, y={:.0}, width={:.0}, height={:.0}",
            rect.x, rect.y, rect.width, rect.height
        );
        if let Some(visible) = element.visible {
            let _ = writeln!(out, "   - Visible: {}", if visible { "yes" } else { "no" });
        }
    }

    let accessibility = [
        ("Role", element.attribute("role")),
        ("ARIA Label", element.attribute("aria-label")),
        ("Title", element.attribute("title")),
    ];
    if accessibility.iter().any(|(_, value)| value.is_some()) {
        let _ = writeln!(out, "   - Accessibility:");
        for (label, value) in accessibility {
            if let Some(value) = value {
                let _ = writeln!(out, "     - {label}: {value}");
            }
        }
    }
}

/// Truncate to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}
