//! Prompt rendering properties.

use std::collections::BTreeMap;

use testsmith::framework;
use testsmith::prompt::{build_prompt, system_prompt, PromptOptions, DEFAULT_SCENARIO};
use testsmith::types::{
    Action, ActionType, BoundingRect, ElementDescriptor, GenerationRequest, PageContext,
};

fn element(tag: &str, id: Option<&str>) -> ElementDescriptor {
    ElementDescriptor {
        tag: tag.to_owned(),
        id: id.map(str::to_owned),
        css_selector: id.map_or_else(|| tag.to_owned(), |id| format!("#{id}")),
        xpath: format!("//{tag}"),
        ..ElementDescriptor::default()
    }
}

fn action(kind: ActionType, target: ElementDescriptor) -> Action {
    Action {
        kind,
        target_element: target,
        value: None,
        description: String::new(),
    }
}

fn playwright() -> &'static framework::FrameworkDescriptor {
    framework::find("playwright-js").expect("playwright should be registered")
}

fn request_with_actions(count: usize) -> GenerationRequest {
    GenerationRequest {
        scenario: Some("Log in and check the dashboard".to_owned()),
        actions: (0..count)
            .map(|i| action(ActionType::Click, element("button", Some(&format!("btn-{i}")))))
            .collect(),
        ..GenerationRequest::default()
    }
}

#[test]
fn one_enumerated_block_per_action() {
    for count in [1_usize, 3, 7] {
        let prompt = build_prompt(&request_with_actions(count), playwright(), PromptOptions::default());
        for i in 1..=count {
            assert!(
                prompt.contains(&format!("\n{i}. click on <button>")),
                "missing block {i} of {count}"
            );
        }
        let next = count + 1;
        assert!(!prompt.contains(&format!("\n{next}. ")));
    }
}

#[test]
fn page_context_block_only_when_present() {
    let mut request = request_with_actions(1);
    let prompt = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(!prompt.contains("Page Context"));

    request.page_context = Some(PageContext {
        url: "https://shop.example.com/cart".to_owned(),
        title: "Cart".to_owned(),
        element_count: 314,
    });
    let prompt = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(prompt.contains("Page Context:"));
    assert!(prompt.contains("- URL: https://shop.example.com/cart"));
    assert!(prompt.contains("- Title: Cart"));
    assert!(prompt.contains("- Elements on page: 314"));
}

#[test]
fn missing_scenario_uses_placeholder() {
    let mut request = request_with_actions(1);
    request.scenario = None;
    let prompt = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(prompt.contains(&format!("Scenario: {DEFAULT_SCENARIO}")));
}

#[test]
fn element_details_and_optional_blocks() {
    let mut attributes = BTreeMap::new();
    attributes.insert("data-testid".to_owned(), "email-field".to_owned());
    attributes.insert("aria-label".to_owned(), "Email address".to_owned());
    let target = ElementDescriptor {
        tag: "input".to_owned(),
        id: Some("email".to_owned()),
        classes: vec!["form-control".to_owned(), "lg".to_owned()],
        text: Some("x".repeat(150)),
        attributes,
        css_selector: "#email".to_owned(),
        xpath: "//*[@id=\"email\"]".to_owned(),
        rect: Some(BoundingRect {
            x: 10.4,
            y: 20.0,
            width: 300.0,
            height: 40.0,
        }),
        visible: Some(true),
    };
    let request = GenerationRequest {
        actions: vec![Action {
            kind: ActionType::Type,
            target_element: target,
            value: Some("user@example.com".to_owned()),
            description: "Fill in the email".to_owned(),
        }],
        ..GenerationRequest::default()
    };

    let prompt = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(prompt.contains("1. type on <input>: Fill in the email"));
    assert!(prompt.contains("   - Value: \"user@example.com\""));
    assert!(prompt.contains("   - ID: email"));
    assert!(prompt.contains("   - Classes: form-control lg"));
    assert!(prompt.contains("   - CSS Selector: #email"));
    assert!(prompt.contains("   - Test ID: email-field"));
    assert!(prompt.contains(&format!("   - Text: \"{}...\"", "x".repeat(100))));
    assert!(!prompt.contains(&"x".repeat(101)));
    assert!(prompt.contains("   - XPath: //*[@id=\"email\"]"));
    assert!(prompt.contains("   - Position: x=10, y=20, width=300, height=40"));
    assert!(prompt.contains("   - Visible: yes"));
    assert!(prompt.contains("   - Accessibility:"));
    assert!(prompt.contains("     - ARIA Label: Email address"));
    assert!(!prompt.contains("     - Role:"));
}

#[test]
fn optional_element_blocks_are_omitted() {
    let prompt = build_prompt(&request_with_actions(1), playwright(), PromptOptions::default());
    assert!(!prompt.contains("Position:"));
    assert!(!prompt.contains("Visible:"));
    assert!(!prompt.contains("Accessibility:"));
    assert!(!prompt.contains("Value:"));
}

#[test]
fn options_toggle_requirement_lines() {
    let request = request_with_actions(1);
    let plain = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(!plain.contains("comments"));
    assert!(!plain.contains("Page Object Model"));

    let rich = build_prompt(
        &request,
        playwright(),
        PromptOptions {
            include_comments: true,
            use_page_object_model: true,
        },
    );
    assert!(rich.contains("- Include clear comments explaining each step"));
    assert!(rich.contains("Page Object Model"));
}

#[test]
fn prompt_ends_with_code_only_instruction() {
    let prompt = build_prompt(&request_with_actions(2), playwright(), PromptOptions::default());
    assert!(prompt.starts_with("Generate a Playwright (JavaScript) test"));
    assert!(prompt.ends_with(
        "Return ONLY the JavaScript code. Do not include explanations, prose, or markdown code fences."
    ));
    assert!(system_prompt(playwright()).contains("Playwright (JavaScript)"));
}

#[test]
fn rendering_is_deterministic() {
    let request = request_with_actions(4);
    let options = PromptOptions {
        include_comments: true,
        use_page_object_model: false,
    };
    assert_eq!(
        build_prompt(&request, playwright(), options),
        build_prompt(&request, playwright(), options)
    );
}

#[test]
fn selected_elements_listed_without_actions() {
    let request = GenerationRequest {
        elements: vec![element("a", Some("home")), element("nav", None)],
        ..GenerationRequest::default()
    };
    let prompt = build_prompt(&request, playwright(), PromptOptions::default());
    assert!(prompt.contains("Selected elements:"));
    assert!(prompt.contains("- <a> #home"));
    assert!(prompt.contains("- <nav> nav"));
    assert!(!prompt.contains("Actions to perform:"));
    assert!(!prompt.contains("\n1. "));
}
