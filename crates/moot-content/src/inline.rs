//! Inline-level markdown rendering.
//!
//! Handles code spans, emphasis, links, and images within one line or block
//! of text. Everything else is escaped and passed through, so emitted HTML
//! never contains user-written tags.

// ─── Output accumulator ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct InlineOut {
  pub(crate) html:       String,
  pub(crate) text:       String,
  pub(crate) has_code:   bool,
  pub(crate) has_images: bool,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Render one inline fragment. Code spans are carved out first; no other
/// construct applies inside them.
pub(crate) fn render(raw: &str) -> InlineOut {
  let mut out = InlineOut::default();
  let mut rest = raw;

  while let Some(open) = rest.find('`') {
    match rest[open + 1..].find('`') {
      Some(len) => {
        styled(&rest[..open], &mut out);
        let code = &rest[open + 1..open + 1 + len];
        out.html.push_str("<code>");
        out.html.push_str(&escape(code));
        out.html.push_str("</code>");
        push_text(&mut out, code);
        if !code.trim().is_empty() {
          out.has_code = true;
        }
        rest = &rest[open + 1 + len + 1..];
      }
      // unmatched backtick: literal from here on
      None => break,
    }
  }
  styled(rest, &mut out);
  out
}

// ─── Construct scanner ───────────────────────────────────────────────────────

/// Scan for emphasis, links, and images; escape everything between them.
fn styled(raw: &str, out: &mut InlineOut) {
  let mut i = 0;
  let mut plain_start = 0;

  while i < raw.len() {
    let rest = &raw[i..];

    // image before link: `![` is a superset of `[`
    if let Some(tail) = rest.strip_prefix('!')
      && tail.starts_with('[')
      && let Some((alt, url, consumed)) = parse_bracketed(tail)
    {
      flush_plain(raw, plain_start, i, out);
      if is_safe_url(url) {
        out.html.push_str("<img src=\"");
        out.html.push_str(&escape(url.trim()));
        out.html.push_str("\" alt=\"");
        out.html.push_str(&escape(alt));
        out.html.push_str("\">");
        out.has_images = true;
        // alt is an attribute; it contributes no searchable text
      } else {
        out.html.push_str(&escape(alt));
        push_text(out, alt);
      }
      i += 1 + consumed;
      plain_start = i;
      continue;
    }

    if rest.starts_with('[')
      && let Some((label, url, consumed)) = parse_bracketed(rest)
    {
      flush_plain(raw, plain_start, i, out);
      if is_safe_url(url) {
        out.html.push_str("<a href=\"");
        out.html.push_str(&escape(url.trim()));
        out.html.push_str("\">");
        out.html.push_str(&escape(label));
        out.html.push_str("</a>");
      } else {
        out.html.push_str(&escape(label));
      }
      push_text(out, label);
      i += consumed;
      plain_start = i;
      continue;
    }

    if rest.starts_with('*') {
      let parsed = if rest.starts_with("**") {
        parse_emphasis(rest, "**").map(|(inner, n)| (inner, n, "strong"))
      } else {
        parse_emphasis(rest, "*").map(|(inner, n)| (inner, n, "em"))
      };
      if let Some((inner, consumed, tag)) = parsed {
        flush_plain(raw, plain_start, i, out);
        out.html.push('<');
        out.html.push_str(tag);
        out.html.push('>');
        out.html.push_str(&escape(inner));
        out.html.push_str("</");
        out.html.push_str(tag);
        out.html.push('>');
        push_text(out, inner);
        i += consumed;
        plain_start = i;
        continue;
      }
    }

    i += rest.chars().next().map_or(1, char::len_utf8);
  }

  flush_plain(raw, plain_start, raw.len(), out);
}

fn flush_plain(raw: &str, start: usize, end: usize, out: &mut InlineOut) {
  if start < end {
    let run = &raw[start..end];
    out.html.push_str(&escape(run));
    push_text(out, run);
  }
}

fn push_text(out: &mut InlineOut, s: &str) {
  out.text.push_str(s);
  out.text.push(' ');
}

// ─── Construct parsers ───────────────────────────────────────────────────────

/// Parse `[text](url)` starting at the `[`. Returns label, url, and bytes
/// consumed. No nesting; a url containing `)` ends early.
fn parse_bracketed(s: &str) -> Option<(&str, &str, usize)> {
  let close = s.find(']')?;
  let after = &s[close + 1..];
  if !after.starts_with('(') {
    return None;
  }
  let end = after.find(')')?;
  Some((&s[1..close], &after[1..end], close + 1 + end + 1))
}

/// Parse `{marker}inner{marker}` starting at the opening marker. The inner
/// text must be non-empty with no whitespace at either edge, which keeps
/// arithmetic like `2 * 3 * 4` literal.
fn parse_emphasis<'a>(s: &'a str, marker: &str) -> Option<(&'a str, usize)> {
  let body = &s[marker.len()..];
  let close = body.find(marker)?;
  let inner = &body[..close];
  if inner.is_empty()
    || inner.starts_with(char::is_whitespace)
    || inner.ends_with(char::is_whitespace)
  {
    return None;
  }
  Some((inner, marker.len() + close + marker.len()))
}

// ─── Sanitization ────────────────────────────────────────────────────────────

/// Escape the five HTML-significant characters.
pub(crate) fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

/// Accept absolute `http`/`https`/`mailto` URLs and scheme-less relative
/// paths; reject everything else (`javascript:`, `data:`, …).
fn is_safe_url(url: &str) -> bool {
  let url = url.trim();
  if url.is_empty() {
    return false;
  }
  let lower = url.to_ascii_lowercase();
  if lower.starts_with("http://")
    || lower.starts_with("https://")
    || lower.starts_with("mailto:")
  {
    return true;
  }
  // a `:` before any path/query/fragment delimiter marks a scheme
  match lower.find(':') {
    None => true,
    Some(i) => lower[..i].contains(['/', '?', '#']),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn html_of(raw: &str) -> String {
    render(raw).html
  }

  #[test]
  fn escapes_specials() {
    assert_eq!(escape("a < b & c > \"d\""), "a &lt; b &amp; c &gt; &quot;d&quot;");
  }

  #[test]
  fn bold_and_italic() {
    assert_eq!(
      html_of("**bold** then *ital*"),
      "<strong>bold</strong> then <em>ital</em>"
    );
  }

  #[test]
  fn arithmetic_stays_literal() {
    assert_eq!(html_of("2 * 3 * 4"), "2 * 3 * 4");
    assert_eq!(html_of("**unclosed"), "**unclosed");
  }

  #[test]
  fn code_span_escapes_and_suppresses_markup() {
    assert_eq!(
      html_of("`<b>**x**</b>`"),
      "<code>&lt;b&gt;**x**&lt;/b&gt;</code>"
    );
  }

  #[test]
  fn unmatched_backtick_is_literal() {
    assert_eq!(html_of("a ` b"), "a ` b");
  }

  #[test]
  fn links_keep_safe_urls_only() {
    assert_eq!(
      html_of("[ok](https://x.y/z)"),
      "<a href=\"https://x.y/z\">ok</a>"
    );
    assert_eq!(html_of("[rel](/local/path)"), "<a href=\"/local/path\">rel</a>");
    assert_eq!(html_of("[bad](javascript:alert)"), "bad");
    assert_eq!(html_of("[bad](data:text/html;x)"), "bad");
  }

  #[test]
  fn url_quotes_cannot_escape_the_attribute() {
    let html = html_of("[x](https://e.com/\"><script>)");
    assert!(!html.contains("\"><script>"));
  }

  #[test]
  fn image_renders_with_alt() {
    assert_eq!(
      html_of("![a pic](https://e.com/p.png)"),
      "<img src=\"https://e.com/p.png\" alt=\"a pic\">"
    );
    assert!(render("![a pic](https://e.com/p.png)").has_images);
  }

  #[test]
  fn whitespace_only_code_span_does_not_flag_code() {
    let out = render("` `");
    assert!(!out.has_code);
  }

  #[test]
  fn multibyte_text_passes_through() {
    assert_eq!(html_of("日本語 **太字**"), "日本語 <strong>太字</strong>");
  }
}
