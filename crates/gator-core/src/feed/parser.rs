use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Error, Result};

/// A fetched feed, produced fresh on every fetch and never stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// One entry of a [`FeedDocument`], in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish date exactly as the feed wrote it
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// RSS 2.0 and RSS 1.0 (RDF)
    Rss,
    Atom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Published,
    Updated,
}

impl Dialect {
    fn from_root(name: &[u8]) -> Result<Self> {
        match name {
            b"rss" | b"rdf:RDF" => Ok(Dialect::Rss),
            b"feed" => Ok(Dialect::Atom),
            other => Err(Error::FeedParse(format!(
                "Unrecognized root element <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn channel_tag(self) -> &'static [u8] {
        match self {
            Dialect::Rss => b"channel",
            Dialect::Atom => b"feed",
        }
    }

    fn item_tag(self) -> &'static [u8] {
        match self {
            Dialect::Rss => b"item",
            Dialect::Atom => b"entry",
        }
    }

    fn field(self, tag: &[u8]) -> Option<Field> {
        match (self, tag) {
            (_, b"title") => Some(Field::Title),
            (Dialect::Rss, b"link") => Some(Field::Link),
            (Dialect::Rss, b"description") => Some(Field::Description),
            (Dialect::Rss, b"pubDate") => Some(Field::Published),
            (Dialect::Atom, b"summary") | (Dialect::Atom, b"subtitle") => Some(Field::Description),
            (Dialect::Atom, b"content") => Some(Field::Content),
            (Dialect::Atom, b"published") => Some(Field::Published),
            (Dialect::Atom, b"updated") => Some(Field::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Fields {
    title: String,
    link: String,
    description: String,
    content: String,
    published: String,
    updated: String,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        }
    }

    fn into_item(self) -> FeedItem {
        let description = prefer(self.description, self.content);
        FeedItem {
            title: unescape_html(&self.title),
            link: self.link.trim().to_string(),
            description: unescape_html(&description),
            pub_date: prefer(self.published, self.updated),
        }
    }
}

/// First non-blank of the two, trimmed
fn prefer(primary: String, fallback: String) -> String {
    if primary.trim().is_empty() {
        fallback.trim().to_string()
    } else {
        primary.trim().to_string()
    }
}

/// Collects channel and item fields while walking the event stream
#[derive(Default)]
struct DocumentBuilder {
    /// Decided by the root element
    dialect: Option<Dialect>,
    stack: Vec<Vec<u8>>,
    channel: Fields,
    item: Option<Fields>,
    /// Stack depth of the open item element
    item_depth: usize,
    items: Vec<FeedItem>,
}

impl DocumentBuilder {
    fn open(&mut self, element: &BytesStart) -> Result<()> {
        let name = element.name().as_ref().to_vec();
        let dialect = match self.dialect {
            Some(dialect) => dialect,
            None => *self.dialect.insert(Dialect::from_root(&name)?),
        };

        if self.item.is_none() && name == dialect.item_tag() {
            self.item = Some(Fields::default());
            self.item_depth = self.stack.len();
        } else if dialect == Dialect::Atom && name == b"link" {
            self.link_attribute(element);
        }
        self.stack.push(name);
        Ok(())
    }

    fn close(&mut self) {
        self.stack.pop();
        if self.item.is_some() && self.stack.len() == self.item_depth {
            if let Some(fields) = self.item.take() {
                self.items.push(fields.into_item());
            }
        }
    }

    /// Atom carries links in `href`; only the alternate link of an entry or the feed counts
    fn link_attribute(&mut self, element: &BytesStart) {
        let Some(target) = self.direct_parent_fields() else {
            return;
        };
        if !target.link.is_empty() {
            return;
        }

        let mut href = None;
        let mut rel = None;
        for attr in element.attributes().flatten() {
            match attr.key.as_ref() {
                b"href" => href = Some(xml_text(&attr.value)),
                b"rel" => rel = Some(xml_text(&attr.value)),
                _ => {}
            }
        }

        if matches!(rel.as_deref(), None | Some("alternate")) {
            if let Some(href) = href {
                target.link = href;
            }
        }
    }

    /// Fields of the item or channel that directly contains the element about to open
    fn direct_parent_fields(&mut self) -> Option<&mut Fields> {
        let channel_tag = self.dialect?.channel_tag();
        match self.item {
            Some(ref mut fields) => (self.stack.len() == self.item_depth + 1).then_some(fields),
            None => {
                let parent = self.stack.last()?;
                (parent.as_slice() == channel_tag).then_some(&mut self.channel)
            }
        }
    }

    fn text(&mut self, text: &str) {
        let Some(dialect) = self.dialect else {
            return;
        };
        let Some(field) = self.stack.last().and_then(|leaf| dialect.field(leaf)) else {
            return;
        };

        let depth = self.stack.len();
        let target = match self.item {
            Some(ref mut fields) => (depth == self.item_depth + 2).then_some(fields),
            None => {
                let parent = depth.checked_sub(2).map(|i| self.stack[i].as_slice());
                (parent == Some(dialect.channel_tag())).then_some(&mut self.channel)
            }
        };

        if let Some(fields) = target {
            fields.slot(field).push_str(text);
        }
    }

    fn finish(self) -> Result<FeedDocument> {
        if self.dialect.is_none() {
            return Err(Error::FeedParse("Document has no root element".to_string()));
        }
        if !self.stack.is_empty() {
            return Err(Error::FeedParse("Unexpected end of document".to_string()));
        }

        let channel = self.channel;
        Ok(FeedDocument {
            title: unescape_html(&channel.title),
            link: channel.link.trim().to_string(),
            description: unescape_html(&channel.description),
            items: self.items,
        })
    }
}

/// XML-unescape raw text one reference at a time.
/// References XML does not know (`&nbsp;`) are kept as written for the HTML pass.
fn xml_text(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    let mut text = String::with_capacity(raw.len());
    let mut rest: &str = &raw;

    while let Some(start) = rest.find('&') {
        text.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .unwrap_or(after.len());

        if name_len == 0 || !after[name_len..].starts_with(';') {
            text.push('&');
            rest = after;
            continue;
        }

        let reference = &rest[start..start + name_len + 2];
        match quick_xml::escape::unescape(reference) {
            Ok(resolved) => text.push_str(&resolved),
            Err(_) => text.push_str(reference),
        }
        rest = &after[name_len + 1..];
    }

    text.push_str(rest);
    text
}

fn unescape_html(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}

/// Parse RSS/Atom feed content into a [`FeedDocument`]
pub fn parse_feed(content: &[u8]) -> Result<FeedDocument> {
    let content = String::from_utf8_lossy(content);
    let mut reader = Reader::from_str(content.trim_start_matches('\u{feff}'));
    let mut builder = DocumentBuilder::default();

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::FeedParse(format!(
                "Malformed XML at position {}: {}",
                reader.error_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => builder.open(&e)?,
            Event::Empty(e) => {
                builder.open(&e)?;
                builder.close();
            }
            Event::End(_) => builder.close(),
            Event::Text(e) => builder.text(&xml_text(&e)),
            Event::CData(e) => builder.text(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rss() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Lane&apos;s Blog</title>
    <link>https://wagslane.dev</link>
    <atom:link href="https://wagslane.dev/index.xml" rel="self" type="application/rss+xml"/>
    <description>Recent content</description>
    <image><title>Logo</title><link>https://wagslane.dev/logo.png</link></image>
    <item>
      <title>First post</title>
      <link>https://wagslane.dev/posts/first/</link>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
      <description>Hello</description>
    </item>
    <item>
      <title>Second post</title>
      <link>https://wagslane.dev/posts/second/</link>
    </item>
  </channel>
</rss>"#;

        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.title, "Lane's Blog");
        assert_eq!(doc.link, "https://wagslane.dev");
        assert_eq!(doc.description, "Recent content");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].title, "First post");
        assert_eq!(doc.items[0].link, "https://wagslane.dev/posts/first/");
        assert_eq!(doc.items[0].pub_date, "Mon, 02 Jan 2006 15:04:05 -0700");
        assert_eq!(doc.items[0].description, "Hello");
        assert_eq!(doc.items[1].description, "");
        assert_eq!(doc.items[1].pub_date, "");
    }

    #[test]
    fn test_html_entities_are_unescaped() {
        let xml = r#"<rss><channel>
  <title>Tom &amp;amp; Jerry</title>
  <description><![CDATA[Cats &amp; mice &eacute;t&eacute;]]></description>
  <item>
    <title>Fish &amp;amp; Chips</title>
    <link>https://example.com/a?x=1&amp;y=2</link>
    <description>&lt;p&gt;Hi&amp;nbsp;there&lt;/p&gt;</description>
  </item>
</channel></rss>"#;

        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.title, "Tom & Jerry");
        assert_eq!(doc.description, "Cats & mice été");
        assert_eq!(doc.items[0].title, "Fish & Chips");
        assert_eq!(doc.items[0].link, "https://example.com/a?x=1&y=2");
        assert_eq!(doc.items[0].description, "<p>Hi\u{a0}there</p>");
    }

    #[test]
    fn test_html_only_entities_do_not_block_xml_unescaping() {
        let xml = r#"<rss><channel>
  <title>News</title>
  <item>
    <title>A &amp;amp; B&nbsp;C</title>
    <link>https://example.com/mixed</link>
    <description>1 &lt; 2 &hellip; &#169; &bogus;</description>
  </item>
  <item>
    <title>A &amp;amp; B</title>
    <link>https://example.com/plain</link>
  </item>
</channel></rss>"#;

        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.items[0].title, "A & B\u{a0}C");
        assert_eq!(doc.items[0].description, "1 < 2 \u{2026} \u{a9} &bogus;");
        assert_eq!(doc.items[1].title, "A & B");
    }

    #[test]
    fn test_xml_text_keeps_unknown_references() {
        assert_eq!(xml_text(b"a &amp;amp; b&nbsp;c"), "a &amp; b&nbsp;c");
        assert_eq!(xml_text(b"&#x41;&#66;&quot;"), "AB\"");
        assert_eq!(xml_text(b"tail &amp"), "tail &amp");
        assert_eq!(xml_text(b"x & y;"), "x & y;");
    }

    #[test]
    fn test_parse_rdf() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/">
  <channel rdf:about="https://example.org/">
    <title>RDF Site</title>
    <link>https://example.org/</link>
  </channel>
  <item rdf:about="https://example.org/1">
    <title>One</title>
    <link>https://example.org/1</link>
  </item>
</rdf:RDF>"#;

        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.title, "RDF Site");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].link, "https://example.org/1");
    }

    #[test]
    fn test_parse_atom() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Site</title>
  <subtitle>All the news</subtitle>
  <link rel="self" href="https://example.net/feed.atom"/>
  <link href="https://example.net/"/>
  <entry>
    <title type="html">A &amp;amp; B</title>
    <link rel="alternate" href="https://example.net/a-and-b"/>
    <updated>2024-03-10T08:30:00Z</updated>
    <content type="html">&lt;b&gt;Body&lt;/b&gt;</content>
  </entry>
  <entry>
    <title>Summary wins</title>
    <link rel="edit" href="https://example.net/edit/2"/>
    <link href="https://example.net/2"/>
    <published>2024-03-09T08:30:00Z</published>
    <updated>2024-03-10T08:30:00Z</updated>
    <summary>Short</summary>
    <content>Long</content>
  </entry>
</feed>"#;

        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.title, "Atom Site");
        assert_eq!(doc.description, "All the news");
        assert_eq!(doc.link, "https://example.net/");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].title, "A & B");
        assert_eq!(doc.items[0].link, "https://example.net/a-and-b");
        assert_eq!(doc.items[0].pub_date, "2024-03-10T08:30:00Z");
        assert_eq!(doc.items[0].description, "<b>Body</b>");
        assert_eq!(doc.items[1].link, "https://example.net/2");
        assert_eq!(doc.items[1].pub_date, "2024-03-09T08:30:00Z");
        assert_eq!(doc.items[1].description, "Short");
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let xml = "<rss><channel><title>Broken</titl></channel></rss>";
        assert!(matches!(parse_feed(xml.as_bytes()), Err(Error::FeedParse(_))));
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let xml = "<rss><channel><title>Cut off</title>";
        assert!(matches!(parse_feed(xml.as_bytes()), Err(Error::FeedParse(_))));
    }

    #[test]
    fn test_non_feed_documents_are_rejected() {
        assert!(parse_feed(b"<html><body>Not a feed</body></html>").is_err());
        assert!(parse_feed(b"").is_err());
        assert!(parse_feed(b"just some text").is_err());
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_feed(b"<rss version=\"2.0\"><channel/></rss>").unwrap();
        assert_eq!(doc, FeedDocument::default());
    }
}
