//! Catalog of target test frameworks.

use serde::Serialize;

/// A test framework code can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameworkDescriptor {
    /// Stable identifier used in settings.
    pub id: &'static str,
    /// Human-readable name, e.g. `Playwright (JavaScript)`.
    pub display_name: &'static str,
    /// Source language of generated code.
    pub language: &'static str,
}

/// Every supported framework.
pub const FRAMEWORKS: [FrameworkDescriptor; 8] = [
    FrameworkDescriptor {
        id: "selenium-python",
        display_name: "Selenium (Python)",
        language: "Python",
    },
    FrameworkDescriptor {
        id: "selenium-java",
        display_name: "Selenium (Java)",
        language: "Java",
    },
    FrameworkDescriptor {
        id: "playwright-js",
        display_name: "Playwright (JavaScript)",
        language: "JavaScript",
    },
    FrameworkDescriptor {
        id: "playwright-python",
        display_name: "Playwright (Python)",
        language: "Python",
    },
    FrameworkDescriptor {
        id: "cypress",
        display_name: "Cypress (JavaScript)",
        language: "JavaScript",
    },
    FrameworkDescriptor {
        id: "puppeteer",
        display_name: "Puppeteer (JavaScript)",
        language: "JavaScript",
    },
    FrameworkDescriptor {
        id: "webdriverio",
        display_name: "WebdriverIO (JavaScript)",
        language: "JavaScript",
    },
    FrameworkDescriptor {
        id: "cucumber",
        display_name: "Cucumber (Gherkin)",
        language: "Gherkin",
    },
];

/// Framework used when settings name none.
pub const DEFAULT_FRAMEWORK_ID: &str = "playwright-js";

/// Look up a framework by id, case-insensitively.
pub fn find(id: &str) -> Option<&'static FrameworkDescriptor> {
    let id = id.trim();
    FRAMEWORKS.iter().find(|f| f.id.eq_ignore_ascii_case(id))
}
