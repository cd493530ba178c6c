/* 📖 # How are annotations pulled out of source files?

Only `/** ... */` blocks are considered. Each block is unwrapped line by line (leading
whitespace, one `*` and one following blank are removed) and then split into tags: a tag starts
at a line whose first non-blank character is `@`, and owns every line up to the next tag.

Tag descriptions carry YAML, so they are dedented by their common indentation instead of being
trimmed per line. That keeps the nesting written in the comment intact.
*/

use std::sync::LazyLock;

use regex::Regex;

static COMMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*\*([\s\S]*?)\*/").expect("comment block pattern is valid")
});

static SECTION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Swagger[a-zA-Z]+").expect("section tag pattern is valid"));

/// One `@title description` entry of a doc comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTag {
    pub title: String,
    pub description: String,
}

/// A parsed `/** ... */` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocComment {
    /// Free text before the first tag.
    pub description: String,
    pub tags: Vec<DocTag>,
}

/// A `Swagger*` tag together with its unparsed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationFragment {
    pub tag_name: String,
    pub raw_payload: String,
}

/// Whether a tag title names a documentation section (`Swagger` followed by letters).
pub fn is_section_tag(title: &str) -> bool {
    SECTION_TAG.is_match(title)
}

/// Parse every doc comment block of `content`, in source order.
pub fn parse_comment_blocks(content: &str) -> Vec<DocComment> {
    COMMENT_BLOCK
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|inner| parse_block(inner.as_str()))
        .collect()
}

/// All section fragments of all doc comments in `content`, in source order.
pub fn extract_fragments(content: &str) -> Vec<AnnotationFragment> {
    parse_comment_blocks(content)
        .into_iter()
        .flat_map(|comment| comment.tags)
        .filter(|tag| is_section_tag(&tag.title))
        .map(|tag| AnnotationFragment {
            tag_name: tag.title,
            raw_payload: tag.description,
        })
        .collect()
}

fn parse_block(inner: &str) -> DocComment {
    let mut description = Vec::new();
    let mut tags: Vec<(String, Vec<&str>)> = Vec::new();

    for line in inner.lines().map(unwrap_line) {
        match split_tag_line(line) {
            Some((title, rest)) => tags.push((title.to_string(), vec![rest])),
            None => match tags.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => description.push(line),
            },
        }
    }

    DocComment {
        description: dedent(&description),
        tags: tags
            .into_iter()
            .map(|(title, lines)| DocTag {
                title,
                description: dedent(&lines),
            })
            .collect(),
    }
}

/// Strip the comment decoration in front of one line.
fn unwrap_line(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('*') {
        Some(rest) => rest
            .strip_prefix(|c: char| c == ' ' || c == '\t')
            .unwrap_or(rest),
        None if trimmed.is_empty() => trimmed,
        None => line,
    }
}

/// `@title rest` -> `(title, rest)`.
fn split_tag_line(line: &str) -> Option<(&str, &str)> {
    let tagged = line.trim_start().strip_prefix('@')?;
    let end = tagged
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(tagged.len());
    if end == 0 {
        return None;
    }
    Some((&tagged[..end], tagged[end..].trim()))
}

fn dedent(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };
    let lines = &lines[start..=end];

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.get(indent..).unwrap_or_else(|| l.trim_start()).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
