use std::collections::{HashMap, HashSet};

use course_core::model::{LessonContent, LessonKind};

/// What the lesson pane shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LessonBodyVm {
    /// Sanitised article HTML plus a Markdown rendering for text displays.
    Article { html: String, markdown: String },
    Video { source: String },
    /// The lesson has no body yet.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonVm {
    pub title: String,
    pub kind_label: &'static str,
    pub body: LessonBodyVm,
}

#[must_use]
pub fn lesson_vm(content: &LessonContent) -> LessonVm {
    let body = if let Some(html) = content.article_html() {
        let html = sanitize_html(html);
        let markdown = html_to_markdown(&html);
        LessonBodyVm::Article { html, markdown }
    } else if let Some(source) = content.video_ref() {
        LessonBodyVm::Video {
            source: source.to_owned(),
        }
    } else {
        LessonBodyVm::Empty
    };

    LessonVm {
        title: content.title.clone(),
        kind_label: match content.kind {
            LessonKind::Article => "Article",
            LessonKind::Video => "Video",
        },
        body,
    }
}

/// Render author Markdown to the sanitised HTML the editor stores.
#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);

    let parser = pulldown_cmark::Parser::new_ext(input, options);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    sanitize_html(&html)
}

#[must_use]
pub fn html_to_markdown(input: &str) -> String {
    let markdown = html2md::parse_html(input);
    normalize_markdown(&markdown)
}

/// Keep the tags a lesson article may use; drop scripts, handlers and unsafe urls.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "div", "span", "br", "hr", "em", "strong", "b", "i", "u", "s", "code", "pre",
        "blockquote", "ul", "ol", "li", "a", "h1", "h2", "h3", "h4", "img", "table", "thead",
        "tbody", "tr", "th", "td",
    ]
    .into_iter()
    .collect();

    let mut attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    attributes.insert("a", ["href"].into_iter().collect());
    attributes.insert("img", ["src", "alt"].into_iter().collect());

    ammonia::Builder::new()
        .tags(tags)
        .tag_attributes(attributes)
        .clean(html)
        .to_string()
}

/// Draft content may be either Markdown typed in a terminal or editor HTML.
#[must_use]
pub fn looks_like_html(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    let Some(start) = lower.find('<') else {
        return false;
    };
    if !lower[start + 1..].contains('>') {
        return false;
    }

    ["<p", "<div", "<span", "<br", "<a ", "<img", "<h1", "<h2", "<ul", "<ol"]
        .iter()
        .any(|tag| lower.contains(tag))
}

/// Normalise a draft to HTML before publishing.
#[must_use]
pub fn draft_to_html(input: &str) -> String {
    if looks_like_html(input) {
        sanitize_html(input)
    } else {
        markdown_to_html(input)
    }
}

#[must_use]
pub fn normalize_markdown(input: &str) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();
    let mut blank_streak = 0usize;

    for line in normalized.split('\n') {
        let trimmed = line.trim_end_matches([' ', '\t']).to_string();
        if trimmed.is_empty() {
            blank_streak += 1;
            if blank_streak > 1 {
                continue;
            }
        } else {
            blank_streak = 0;
        }
        lines.push(trimmed);
    }

    let mut output = lines.join("\n");
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{LessonBody, LessonId};

    fn content(kind: LessonKind, body: Option<LessonBody>) -> LessonContent {
        LessonContent {
            id: LessonId::new(1),
            title: "Ownership".into(),
            kind,
            body,
            draft_content: None,
            updated_at: None,
        }
    }

    #[test]
    fn article_html_is_sanitised_before_display() {
        let vm = lesson_vm(&content(
            LessonKind::Article,
            Some(LessonBody::Article(
                "<h2>Moves</h2><p onclick=\"x()\">Values move.</p><script>alert(1)</script>".into(),
            )),
        ));
        let LessonBodyVm::Article { html, markdown } = vm.body else {
            panic!("expected an article");
        };
        assert!(html.contains("<h2>Moves</h2>"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("script"));
        assert!(markdown.contains("Values move."));
        assert_eq!(vm.kind_label, "Article");
    }

    #[test]
    fn video_and_empty_lessons() {
        let video = lesson_vm(&content(
            LessonKind::Video,
            Some(LessonBody::Video("/media/1.mp4".into())),
        ));
        assert_eq!(
            video.body,
            LessonBodyVm::Video {
                source: "/media/1.mp4".into()
            }
        );
        assert_eq!(lesson_vm(&content(LessonKind::Video, None)).body, LessonBodyVm::Empty);
    }

    #[test]
    fn markdown_to_html_sanitizes_links() {
        let html = markdown_to_html("[Link](javascript:alert(1))");
        assert!(html.contains("Link"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn drafts_are_published_as_html() {
        assert!(draft_to_html("**bold**").contains("<p><strong>bold</strong></p>"));
        assert_eq!(draft_to_html("<p>kept</p>"), "<p>kept</p>");
        assert!(!looks_like_html("2 < 3 > 1"));
    }

    #[test]
    fn html_to_markdown_normalizes_output() {
        let markdown = html_to_markdown("<p>Hello</p>\r\n<p>World</p>");
        assert_eq!(markdown, "Hello\n\nWorld\n");
    }
}
