//! Shared helpers for integration tests: socket guard and Atom feed builders.

#![allow(dead_code)]

pub mod socket_guard;

/// One `<entry>` as the arXiv API renders it.
pub fn atom_entry(
    abs_url: &str,
    published: &str,
    updated: &str,
    title: &str,
    summary: &str,
    categories: &[&str],
) -> String {
    let primary = categories.first().map_or_else(String::new, |code| {
        format!(r#"<arxiv:primary_category term="{code}" scheme="http://arxiv.org/schemas/atom"/>"#)
    });
    let categories: String = categories
        .iter()
        .map(|code| format!(r#"<category term="{code}" scheme="http://arxiv.org/schemas/atom"/>"#))
        .collect();
    format!(
        "<entry>\
         <id>{abs_url}</id>\
         <updated>{updated}</updated>\
         <published>{published}</published>\
         <title>{title}</title>\
         <summary>{summary}</summary>\
         <author><name>A. Author</name></author>\
         {primary}{categories}\
         </entry>"
    )
}

/// A result page wrapping `entries`, reporting `total` matches for the window.
pub fn atom_feed(total: u64, entries: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <link href="http://arxiv.org/api/query" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/test</id>
  <updated>2024-01-10T00:00:00-05:00</updated>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">{total}</opensearch:totalResults>
  <opensearch:startIndex xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:startIndex>
  {}
</feed>"#,
        entries.join("\n  ")
    )
}
