//! Generation request types produced by the DOM inspector.
//!
//! The inspector serializes camelCase JSON; these types read it unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of recorded user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Mouse click.
    Click,
    /// Text entry.
    Type,
    /// Option selection in a `<select>`.
    Select,
    /// Mouse hover.
    Hover,
    /// Wait for the element.
    Wait,
    /// Assertion on the element.
    Assert,
}

impl ActionType {
    /// Lowercase verb used in prompts and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Select => "select",
            Self::Hover => "hover",
            Self::Wait => "wait",
            Self::Assert => "assert",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element bounding box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// A DOM element captured by the inspector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementDescriptor {
    /// Lowercase tag name.
    pub tag: String,
    /// `id` attribute.
    pub id: Option<String>,
    /// Class list.
    pub classes: Vec<String>,
    /// Visible text content.
    pub text: Option<String>,
    /// All attributes by name.
    pub attributes: BTreeMap<String, String>,
    /// Unique CSS selector.
    pub css_selector: String,
    /// Absolute XPath.
    pub xpath: String,
    /// Bounding box, when captured.
    pub rect: Option<BoundingRect>,
    /// Whether the element was visible, when captured.
    pub visible: Option<bool>,
}

impl ElementDescriptor {
    /// `id` when present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Trimmed text when present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Attribute value when present and non-empty.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Most stable selector available: `#id`, then `data-testid`, then the CSS selector.
    pub fn best_selector(&self) -> String {
        if let Some(id) = self.id() {
            return format!("#{id}");
        }
        if let Some(test_id) = self.attribute("data-testid") {
            return format!("[data-testid=\"{test_id}\"]");
        }
        if !self.css_selector.is_empty() {
            return self.css_selector.clone();
        }
        self.tag.clone()
    }
}

/// A recorded user interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Interaction kind.
    #[serde(rename = "type")]
    pub kind: ActionType,
    /// Element the interaction targets.
    pub target_element: ElementDescriptor,
    /// Typed or selected value.
    #[serde(default)]
    pub value: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Page the elements were captured on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageContext {
    /// Page URL.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Number of elements on the page.
    pub element_count: u32,
}

/// Everything needed to generate one test.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationRequest {
    /// Free-text test scenario.
    pub scenario: Option<String>,
    /// Recorded actions in order.
    pub actions: Vec<Action>,
    /// Selected elements.
    pub elements: Vec<ElementDescriptor>,
    /// Page the recording came from.
    pub page_context: Option<PageContext>,
}

impl GenerationRequest {
    /// Parse a request from inspector JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON does not match the request shape.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Scenario text when present and non-blank.
    pub fn scenario(&self) -> Option<&str> {
        self.scenario
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
