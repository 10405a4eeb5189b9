//! Markdown codec for Moot.
//!
//! Renders the markdown subset used in post and comment bodies to sanitized
//! HTML, extracts plain text for search, and computes content flags. Pure
//! synchronous; no HTTP or database dependencies.
//!
//! Safety model: every byte of user input is HTML-escaped *before* any markup
//! is emitted, so the output can only contain tags this crate writes itself.
//! Link and image URLs are restricted to `http`, `https`, `mailto`, and
//! relative paths.
//!
//! # Quick start
//!
//! ```
//! use moot_content::process;
//!
//! let rendered = process("# Hi\n\nSome `code` here.");
//! assert!(rendered.html.contains("<h1>Hi</h1>"));
//! assert!(rendered.has_code);
//! assert_eq!(rendered.word_count, 4);
//! ```

mod inline;
mod render;

use uuid::Uuid;

// ─── Public types ────────────────────────────────────────────────────────────

/// The result of processing a markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  /// Sanitized HTML for display.
  pub html:       String,
  /// Plain text (markup stripped, whitespace collapsed) for search indexing.
  pub text:       String,
  /// Whether the body contains a fenced block or inline code span.
  pub has_code:   bool,
  /// Whether the body contains at least one rendered image.
  pub has_images: bool,
  /// Word count of the plain text.
  pub word_count: usize,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Render `markdown` to sanitized HTML and analyze it.
pub fn process(markdown: &str) -> Rendered {
  let outcome = render::render(markdown);
  let word_count = outcome.text.split_whitespace().count();
  Rendered {
    html: outcome.html,
    text: outcome.text,
    has_code: outcome.has_code,
    has_images: outcome.has_images,
    word_count,
  }
}

/// Build a URL slug from a post title.
///
/// Lowercased ASCII alphanumerics with hyphens, at most 50 characters of
/// title, suffixed with the first 8 hex digits of `post_id` so slugs stay
/// unique across identical titles. Titles with no usable characters yield
/// `post-{id}`.
pub fn slugify(title: &str, post_id: Uuid) -> String {
  let mut slug = String::with_capacity(title.len().min(50));
  let mut pending_hyphen = false;

  for c in title.chars() {
    if c.is_ascii_alphanumeric() {
      if pending_hyphen && !slug.is_empty() {
        slug.push('-');
      }
      pending_hyphen = false;
      slug.push(c.to_ascii_lowercase());
    } else if c.is_whitespace() || c == '-' {
      pending_hyphen = true;
    }
    // other punctuation is dropped without forcing a hyphen
  }

  slug.truncate(50);
  while slug.ends_with('-') {
    slug.pop();
  }

  let id = post_id.simple().to_string();
  let id = &id[..8];
  if slug.is_empty() {
    format!("post-{id}")
  } else {
    format!("{slug}-{id}")
  }
}

// ─── End-to-end tests ────────────────────────────────────────────────────────
