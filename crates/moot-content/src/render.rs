//! Block-level markdown rendering.
//!
//! Pipeline:
//!   raw &str
//!     └─ lines()
//!          └─ block scanner (fences, headings, rules, quotes, lists)
//!               └─ inline::render() per fragment
//!                    └─ joined HTML + collapsed plain text

use crate::inline::{self, InlineOut};

// ─── Output ──────────────────────────────────────────────────────────────────

pub(crate) struct Outcome {
  pub(crate) html:       String,
  pub(crate) text:       String,
  pub(crate) has_code:   bool,
  pub(crate) has_images: bool,
}

// ─── Block scanner ───────────────────────────────────────────────────────────

pub(crate) fn render(input: &str) -> Outcome {
  let lines: Vec<&str> = input.lines().collect();
  let mut blocks: Vec<String> = Vec::new();
  let mut acc = InlineOut::default();
  let mut i = 0;

  while i < lines.len() {
    let trimmed = lines[i].trim();

    if trimmed.is_empty() {
      i += 1;
      continue;
    }

    // fenced code block, runs to the closing fence or end of input
    if let Some(info) = trimmed.strip_prefix("```") {
      let lang = info.trim().to_ascii_lowercase();
      let mut body = String::new();
      i += 1;
      while i < lines.len() && lines[i].trim() != "```" {
        body.push_str(lines[i]);
        body.push('\n');
        i += 1;
      }
      if i < lines.len() {
        i += 1; // closing fence
      }
      let mut block = String::from("<pre><code");
      if !lang.is_empty() && lang.chars().all(is_lang_char) {
        block.push_str(" class=\"language-");
        block.push_str(&lang);
        block.push('"');
      }
      block.push('>');
      block.push_str(&inline::escape(&body));
      block.push_str("</code></pre>");
      blocks.push(block);
      if !body.trim().is_empty() {
        acc.has_code = true;
      }
      acc.text.push_str(&body);
      acc.text.push(' ');
      continue;
    }

    if let Some((level, rest)) = heading(trimmed) {
      let frag = merge(inline::render(rest), &mut acc);
      blocks.push(format!("<h{level}>{frag}</h{level}>"));
      i += 1;
      continue;
    }

    if is_rule(trimmed) {
      blocks.push("<hr>".to_string());
      i += 1;
      continue;
    }

    if trimmed.starts_with('>') {
      let mut quoted = Vec::new();
      while i < lines.len() {
        let t = lines[i].trim();
        let Some(content) = t.strip_prefix('>') else {
          break;
        };
        quoted.push(merge(
          inline::render(content.strip_prefix(' ').unwrap_or(content)),
          &mut acc,
        ));
        i += 1;
      }
      blocks.push(format!(
        "<blockquote><p>{}</p></blockquote>",
        quoted.join("<br>\n")
      ));
      continue;
    }

    if unordered_item(trimmed).is_some() {
      let mut items = String::new();
      while i < lines.len()
        && let Some(item) = unordered_item(lines[i].trim())
      {
        items.push_str("<li>");
        items.push_str(&merge(inline::render(item), &mut acc));
        items.push_str("</li>");
        i += 1;
      }
      blocks.push(format!("<ul>{items}</ul>"));
      continue;
    }

    if ordered_item(trimmed).is_some() {
      let mut items = String::new();
      while i < lines.len()
        && let Some(item) = ordered_item(lines[i].trim())
      {
        items.push_str("<li>");
        items.push_str(&merge(inline::render(item), &mut acc));
        items.push_str("</li>");
        i += 1;
      }
      blocks.push(format!("<ol>{items}</ol>"));
      continue;
    }

    // paragraph: consecutive plain lines, single newlines become <br>
    let mut para = Vec::new();
    while i < lines.len() {
      let t = lines[i].trim();
      if t.is_empty() || starts_block(t) {
        break;
      }
      para.push(merge(inline::render(t), &mut acc));
      i += 1;
    }
    blocks.push(format!("<p>{}</p>", para.join("<br>\n")));
  }

  Outcome {
    html:       blocks.join("\n"),
    text:       acc.text.split_whitespace().collect::<Vec<_>>().join(" "),
    has_code:   acc.has_code,
    has_images: acc.has_images,
  }
}

/// Fold an inline fragment's text and flags into the accumulator; hand back
/// its HTML.
fn merge(frag: InlineOut, acc: &mut InlineOut) -> String {
  acc.text.push_str(&frag.text);
  acc.has_code |= frag.has_code;
  acc.has_images |= frag.has_images;
  frag.html
}

// ─── Line classifiers ────────────────────────────────────────────────────────

fn starts_block(trimmed: &str) -> bool {
  trimmed.starts_with("```")
    || heading(trimmed).is_some()
    || is_rule(trimmed)
    || trimmed.starts_with('>')
    || unordered_item(trimmed).is_some()
    || ordered_item(trimmed).is_some()
}

/// `# ` through `###### `.
fn heading(line: &str) -> Option<(usize, &str)> {
  let level = line.bytes().take_while(|&b| b == b'#').count();
  if (1..=6).contains(&level)
    && let Some(rest) = line[level..].strip_prefix(' ')
  {
    return Some((level, rest.trim()));
  }
  None
}

/// Three or more `-` or `*` and nothing else.
fn is_rule(line: &str) -> bool {
  line.len() >= 3
    && (line.bytes().all(|b| b == b'-') || line.bytes().all(|b| b == b'*'))
}

fn unordered_item(line: &str) -> Option<&str> {
  line
    .strip_prefix("- ")
    .or_else(|| line.strip_prefix("* "))
    .map(str::trim)
}

fn ordered_item(line: &str) -> Option<&str> {
  let digits = line.bytes().take_while(u8::is_ascii_digit).count();
  if digits == 0 {
    return None;
  }
  line[digits..].strip_prefix(". ").map(str::trim)
}

fn is_lang_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#')
}

#[cfg(test)]
mod tests {
  use super::*;

  fn html_of(input: &str) -> String {
    render(input).html
  }

  #[test]
  fn heading_levels() {
    assert_eq!(html_of("### Sub"), "<h3>Sub</h3>");
    assert_eq!(html_of("###### Deep"), "<h6>Deep</h6>");
    // seven hashes is not a heading
    assert_eq!(html_of("####### nope"), "<p>####### nope</p>");
    // no space after the hashes is not a heading
    assert_eq!(html_of("#nope"), "<p>#nope</p>");
  }

  #[test]
  fn rule_vs_list_item() {
    assert_eq!(html_of("---"), "<hr>");
    assert_eq!(html_of("- item"), "<ul><li>item</li></ul>");
  }

  #[test]
  fn blank_lines_split_paragraphs() {
    assert_eq!(html_of("one\n\ntwo"), "<p>one</p>\n<p>two</p>");
  }

  #[test]
  fn ordered_list() {
    assert_eq!(
      html_of("1. first\n2. second\n10. tenth"),
      "<ol><li>first</li><li>second</li><li>tenth</li></ol>"
    );
  }

  #[test]
  fn blockquote_joins_lines() {
    assert_eq!(
      html_of("> a\n> b"),
      "<blockquote><p>a<br>\nb</p></blockquote>"
    );
  }

  #[test]
  fn fence_without_language() {
    assert_eq!(html_of("```\nx < y\n```"), "<pre><code>x &lt; y\n</code></pre>");
  }

  #[test]
  fn fence_with_hostile_info_string_gets_no_class() {
    let html = html_of("```\"><script>\ncode\n```");
    assert!(!html.contains("class="));
    assert!(html.starts_with("<pre><code>"));
  }

  #[test]
  fn unclosed_fence_runs_to_end() {
    assert_eq!(
      html_of("```rust\nlet x = 1;"),
      "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>"
    );
  }

  #[test]
  fn list_interrupts_paragraph() {
    assert_eq!(
      html_of("intro\n- a\n- b"),
      "<p>intro</p>\n<ul><li>a</li><li>b</li></ul>"
    );
  }

  #[test]
  fn text_collapses_whitespace() {
    let out = render("# A  title\n\npara   text\n\n- item");
    assert_eq!(out.text, "A title para text item");
  }
}
