//! Heading-boundary markdown chunking (§4.3.2).
//!
//! A chunk spans from one `#`/`##`/`###` heading to the next heading of
//! equal-or-greater depth (i.e. equal or shallower nesting level). The
//! `heading_path` records the breadcrumb of enclosing headings, e.g.
//! `"Architecture > Rules > Deny"`.

/// One chunk produced by `chunk_markdown`.
pub struct HeadingChunk {
    pub heading_path: String,
    pub text: String,
}

struct Heading {
    depth: usize,
    title: String,
    line_start: usize,
}

/// Split `content` into heading-bounded chunks.
///
/// Content preceding the first heading (if any) is dropped — there is no
/// heading path to attach it to, matching the teacher's convention of
/// treating front matter / preambles as non-chunked metadata.
pub fn chunk_markdown(content: &str) -> Vec<HeadingChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let headings = find_headings(&lines);

    if headings.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut stack: Vec<&Heading> = Vec::new();

    for (i, heading) in headings.iter().enumerate() {
        while stack.last().is_some_and(|h| h.depth >= heading.depth) {
            stack.pop();
        }
        stack.push(heading);

        let heading_path = stack.iter().map(|h| h.title.as_str()).collect::<Vec<_>>().join(" > ");

        let body_start = heading.line_start + 1;
        let body_end = headings
            .iter()
            .skip(i + 1)
            .find(|next| next.depth <= heading.depth)
            .map(|next| next.line_start)
            .unwrap_or(lines.len());

        let text = lines[body_start.min(lines.len())..body_end.min(lines.len())]
            .join("\n")
            .trim()
            .to_string();

        chunks.push(HeadingChunk { heading_path, text });
    }

    chunks
}

fn find_headings(lines: &[&str]) -> Vec<Heading> {
    let mut in_code_block = false;
    let mut headings = Vec::new();

    for (line_start, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        if let Some(depth) = heading_depth(trimmed) {
            let title = trimmed.trim_start_matches('#').trim().to_string();
            headings.push(Heading { depth, title, line_start });
        }
    }

    headings
}

fn heading_depth(trimmed_line: &str) -> Option<usize> {
    let depth = trimmed_line.chars().take_while(|c| *c == '#').count();
    if depth == 0 || depth > 6 {
        return None;
    }
    let rest = &trimmed_line[depth..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(depth)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_nested_headings_with_breadcrumb_path() {
        let md = "# Architecture\n\nIntro.\n\n## Rules\n\nRules intro.\n\n### Deny\n\nDeny text.\n\n## Context\n\nContext text.\n";
        let chunks = chunk_markdown(md);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].heading_path, "Architecture");
        assert_eq!(chunks[0].text, "Intro.");
        assert_eq!(chunks[1].heading_path, "Architecture > Rules");
        assert_eq!(chunks[1].text, "Rules intro.");
        assert_eq!(chunks[2].heading_path, "Architecture > Rules > Deny");
        assert_eq!(chunks[2].text, "Deny text.");
        assert_eq!(chunks[3].heading_path, "Architecture > Context");
        assert_eq!(chunks[3].text, "Context text.");
    }

    #[test]
    fn ignores_headings_inside_code_blocks() {
        let md = "# Title\n\n```\n# not a heading\n```\n\nBody.\n";
        let chunks = chunk_markdown(md);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "```\n# not a heading\n```\n\nBody.");
    }

    #[test]
    fn no_headings_produces_no_chunks() {
        assert!(chunk_markdown("just some text\nno headings here\n").is_empty());
    }
}
