//! XHTML 1.1 documents: chapter pages and the cover title page.

use crate::epub::opf::LANGUAGE;
use crate::pipeline::illustrations::IllustrationMap;

pub const TITLE_PAGE_FILE: &str = "titlepage.xhtml";
pub const COVER_FILE: &str = "cover.jpg";

/// Chapter document for `Text/<ordinal>.xhtml`. `body` is inserted as markup, unescaped.
pub fn chapter_document(title: &str, body: &str) -> String {
    let title = xml_escape(title);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}">
<head>
  <meta http-equiv="Content-Type" content="text/html; charset=utf-8"/>
  <title>{title}</title>
</head>
<body>
  <h1>{title}</h1>
{body}
</body>
</html>
"#,
        lang = LANGUAGE,
        title = title,
        body = body
    )
}

/// Static title page showing the cover image.
pub fn title_page() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}">
<head>
  <title>封面</title>
</head>
<body>
  <div style="text-align: center;">
    <img src="../Images/{cover}" alt="Cover" style="max-width: 100%; height: auto;"/>
  </div>
</body>
</html>
"#,
        lang = LANGUAGE,
        cover = COVER_FILE
    )
}

/// Replace each resolved illustration URL in `body` with its local path.
///
/// Longer URLs are replaced first so a URL that prefixes another cannot clobber it. The
/// attribute-escaped form (`&` as `&amp;`) is replaced too, since re-serialized markup
/// stores it that way. Absolute URLs are replaced wherever they occur; relative ones only
/// as a whole quoted attribute value, because they also appear as the tail of other
/// absolute URLs. Unresolved URLs are left untouched.
pub fn rewrite_illustration_refs(body: &str, illustrations: &IllustrationMap) -> String {
    let mut entries: Vec<(&str, &str)> = illustrations.iter().collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    entries
        .into_iter()
        .fold(body.to_string(), |acc, (src, filename)| {
            let local = format!("../Images/{}", filename);
            let escaped = src.replace('&', "&amp;");
            let mut forms = vec![src];
            if escaped != src {
                forms.push(escaped.as_str());
            }
            forms
                .into_iter()
                .fold(acc, |acc, form| replace_reference(&acc, form, &local))
        })
}

fn replace_reference(body: &str, src: &str, local: &str) -> String {
    if src.contains("://") {
        return body.replace(src, local);
    }
    ['"', '\'']
        .into_iter()
        .fold(body.to_string(), |acc, quote| {
            acc.replace(
                &format!("{quote}{src}{quote}"),
                &format!("{quote}{local}{quote}"),
            )
        })
}

pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_document_escapes_title_not_body() {
        let doc = chapter_document("A & B <1>", "<p>body &amp; more</p>");
        assert!(doc.contains("<title>A &amp; B &lt;1&gt;</title>"));
        assert!(doc.contains("<h1>A &amp; B &lt;1&gt;</h1>"));
        assert!(doc.contains("<p>body &amp; more</p>"));
        assert!(doc.starts_with("<?xml"));
    }

    #[test]
    fn title_page_points_at_cover() {
        assert!(title_page().contains(r#"src="../Images/cover.jpg""#));
    }

    #[test]
    fn rewrite_replaces_resolved_and_leaves_dangling() {
        let mut map = IllustrationMap::new();
        map.insert("https://img.test/a.jpg", "aaa.jpg");
        let body = r#"<img src="https://img.test/a.jpg"/><img src="https://img.test/b.jpg"/><img src="https://img.test/a.jpg"/>"#;
        let out = rewrite_illustration_refs(body, &map);
        assert_eq!(
            out,
            r#"<img src="../Images/aaa.jpg"/><img src="https://img.test/b.jpg"/><img src="../Images/aaa.jpg"/>"#
        );
    }

    #[test]
    fn rewrite_prefers_longer_urls() {
        let mut map = IllustrationMap::new();
        map.insert("https://img.test/a.jpg", "short.jpg");
        map.insert("https://img.test/a.jpg?size=large", "long.jpg");
        let body = r#"<img src="https://img.test/a.jpg?size=large"/><img src="https://img.test/a.jpg"/>"#;
        let out = rewrite_illustration_refs(body, &map);
        assert_eq!(
            out,
            r#"<img src="../Images/long.jpg"/><img src="../Images/short.jpg"/>"#
        );
    }

    #[test]
    fn rewrite_handles_escaped_ampersand() {
        let mut map = IllustrationMap::new();
        map.insert("https://img.test/p?id=1&s=2", "x.jpg");
        let body = r#"<img src="https://img.test/p?id=1&amp;s=2"/>"#;
        assert_eq!(
            rewrite_illustration_refs(body, &map),
            r#"<img src="../Images/x.jpg"/>"#
        );
    }

    #[test]
    fn relative_src_is_not_replaced_inside_other_urls() {
        let mut map = IllustrationMap::new();
        map.insert("/pics/a.jpg", "h.jpg");
        let body = r#"<img src="/pics/a.jpg"/><img src="https://img.test/pics/a.jpg"/><img src='/pics/a.jpg'/>"#;
        assert_eq!(
            rewrite_illustration_refs(body, &map),
            r#"<img src="../Images/h.jpg"/><img src="https://img.test/pics/a.jpg"/><img src='../Images/h.jpg'/>"#
        );
    }
}
