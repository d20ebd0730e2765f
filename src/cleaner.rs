//! Strip conversational wrapping from model output.
//!
//! Models often echo the framework name as a header line and wrap code in
//! markdown fences despite being told not to. [`clean_response`] removes,
//! in order:
//!
//! 1. a leading header such as `Selenium (Python)` or
//!    `Playwright (JavaScript) (Test)`
//! 2. an opening fence, optionally tagged with a known language
//! 3. a closing fence
//! 4. any other fence line left at either edge
//!
//! and then trims whitespace. The steps repeat until the text stops
//! changing, so cleaning is idempotent. A consequence: a header-shaped first
//! line inside a fenced block is stripped too, once the fence is gone.

use std::sync::OnceLock;

use regex::Regex;

/// Language tags recognized on an opening fence.
pub const FENCE_LANGUAGES: [&str; 14] = [
    "javascript",
    "js",
    "typescript",
    "ts",
    "python",
    "py",
    "java",
    "csharp",
    "cs",
    "ruby",
    "rb",
    "gherkin",
    "feature",
    "cucumber",
];

struct Patterns {
    header: Regex,
    opening_fence: Regex,
    closing_fence: Regex,
    leading_fence_line: Regex,
    trailing_fence_line: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let languages = FENCE_LANGUAGES.join("|");
            Some(Patterns {
                // Groups must be non-empty, so calls like `main()` survive.
                header: Regex::new(r"^[\w ]+(?:\([^)\n]+\)[ \t]*){1,2}\r?\n").ok()?,
                opening_fence: Regex::new(&format!(
                    r"^(?i)```[ \t]*(?:{languages})?[ \t]*\r?\n"
                ))
                .ok()?,
                closing_fence: Regex::new(r"\r?\n?```[ \t]*\s*$").ok()?,
                leading_fence_line: Regex::new(r"^\s*```[^\n]*(?:\n|$)").ok()?,
                trailing_fence_line: Regex::new(r"(?:^|\n)[ \t]*```[^\n]*\s*$").ok()?,
            })
        })
        .as_ref()
}

/// Reduce raw model output to bare source code.
///
/// Total: any input, including the empty string, yields a result.
pub fn clean_response(raw: &str) -> String {
    let mut current = clean_once(raw);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let Some(p) = patterns() else {
        return raw.trim().to_owned();
    };

    let text = p.header.replace(raw, "");
    let text = p.opening_fence.replace(&text, "");
    let text = p.closing_fence.replace(&text, "");
    let text = p.leading_fence_line.replace(&text, "");
    let text = p.trailing_fence_line.replace(&text, "");
    text.trim().to_owned()
}
