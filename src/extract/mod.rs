use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// A code file recovered from a fenced region of a frozen message.
/// Derived data only, recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub content: String,
    pub language: String,
}

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w+)\n((?s:.+?))```").unwrap());

/// Filename directive grammar, one alternation with explicit precedence:
///
///   1. line comment   `// [name]`
///   2. block comment  `/* [name]`
///   3. doc star       `* [name]`
///   4. bare           `[filename: name]`
///
/// The leftmost match wins; at the same position the order above decides.
static FILENAME_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"//\s*\[([^\]\n]+)\]|/\*\s*\[([^\]\n]+)\]|\*\s*\[([^\]\n]+)\]|\[filename:\s*([^\]\n]+)\]",
    )
    .unwrap()
});

// never offered for preview
const SHELL_FAMILY: [&str; 4] = ["bash", "shell", "sh", "zsh"];

/// True iff the text contains at least one fenced code region, shell-tagged
/// ones included. A shell-only message reports true yet extracts zero files;
/// that asymmetry is inherited behavior and intentional.
pub fn has_code(text: &str) -> bool {
    CODE_BLOCK.is_match(text)
}

/// Pure scan over frozen message text. Re-running on unchanged text always
/// yields the identical set. Duplicate resolved names overwrite, last wins.
pub fn extract_files(text: &str) -> BTreeMap<String, ExtractedFile> {
    let mut files = BTreeMap::new();

    for caps in CODE_BLOCK.captures_iter(text) {
        let language = caps[1].to_string();
        let content = &caps[2];

        if SHELL_FAMILY.contains(&language.to_lowercase().as_str()) {
            continue;
        }

        let name = match FILENAME_DIRECTIVE.captures(content) {
            Some(directive) => directive
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| {
                    let raw = m.as_str().trim();
                    raw.strip_prefix("filename:").unwrap_or(raw).trim().to_string()
                })
                .unwrap_or_else(|| format!("file.{}", language)),
            None => format!("file.{}", language),
        };

        // strip the first directive occurrence from the content
        let content = FILENAME_DIRECTIVE.replace(content, "").trim().to_string();

        files.insert(name, ExtractedFile { content, language });
    }

    files
}
