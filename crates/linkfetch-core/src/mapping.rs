//! Source mapping - which destination paths each source is fetched to
//!
//! Built from a link file with one `<source> <destination-filename>` entry
//! per line. Destination names are resolved against the output directory.

use crate::error::LinkfetchError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Map from source URL to its deduplicated destination paths
///
/// Destinations keep the order they were first named in; the first one
/// receives the staging file and the rest are copied from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapping {
    entries: BTreeMap<String, Vec<PathBuf>>,
}

impl SourceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination for `source`
    /// Returns false if the destination was already present
    pub fn insert(&mut self, source: impl Into<String>, destination: impl Into<PathBuf>) -> bool {
        let destination = destination.into();
        let destinations = self.entries.entry(source.into()).or_default();

        if destinations.contains(&destination) {
            false
        } else {
            destinations.push(destination);
            true
        }
    }

    /// Number of unique sources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn destinations(&self, source: &str) -> Option<&[PathBuf]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.entries
            .iter()
            .map(|(source, destinations)| (source.as_str(), destinations.as_slice()))
    }

    /// Parse link file contents
    ///
    /// Malformed lines are returned in [`ParsedLinks::skipped`] rather than
    /// failing the whole file.
    pub fn parse(text: &str, output_dir: &Path) -> ParsedLinks {
        Self::parse_lines(text.lines().map(Ok), output_dir)
    }

    fn parse_lines<'a>(
        lines: impl Iterator<Item = Result<&'a str, &'a [u8]>>,
        output_dir: &Path,
    ) -> ParsedLinks {
        let mut mapping = SourceMapping::new();
        let mut skipped = Vec::new();

        for (index, line) in lines.enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(bytes) => {
                    skipped.push(SkippedLine {
                        line_number: index + 1,
                        content: String::from_utf8_lossy(bytes).into_owned(),
                        reason: "line is not valid UTF-8".to_string(),
                    });
                    continue;
                }
            };

            let mut fields = line.split_whitespace();
            let (source, filename) = match (fields.next(), fields.next()) {
                (Some(source), Some(filename)) => (source, filename),
                _ => {
                    skipped.push(SkippedLine {
                        line_number: index + 1,
                        content: line.to_string(),
                        reason: "expected '<link> <file name>'".to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = validate_source(source) {
                skipped.push(SkippedLine {
                    line_number: index + 1,
                    content: line.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }

            mapping.insert(source, output_dir.join(filename));
        }

        ParsedLinks { mapping, skipped }
    }

    /// Read and parse a link file, logging every skipped line
    pub async fn from_file(path: &Path, output_dir: &Path) -> Result<ParsedLinks, LinkfetchError> {
        // Lines are decoded one by one so a bad byte only costs its own line
        let raw = tokio::fs::read(path).await?;
        let parsed = Self::parse_lines(split_lines(&raw), output_dir);

        for line in &parsed.skipped {
            warn!(
                "Link file {:?} line #{} skipped ({}): [{}]",
                path, line.line_number, line.reason, line.content
            );
        }
        for (source, destinations) in parsed.mapping.iter() {
            debug!("[{}] -> {:?}", source, destinations);
        }

        Ok(parsed)
    }
}

impl IntoIterator for SourceMapping {
    type Item = (String, Vec<PathBuf>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<PathBuf>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Result of parsing a link file
#[derive(Debug, Clone, Default)]
pub struct ParsedLinks {
    pub mapping: SourceMapping,
    pub skipped: Vec<SkippedLine>,
}

/// A link file line that was not turned into a mapping entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number
    pub line_number: usize,
    pub content: String,
    pub reason: String,
}

/// Split raw bytes the way `str::lines` does, decoding each line separately
fn split_lines(raw: &[u8]) -> impl Iterator<Item = Result<&str, &[u8]>> {
    let body = raw.strip_suffix(b"\n").unwrap_or(raw);
    let lines = if raw.is_empty() { None } else { Some(body.split(|b| *b == b'\n')) };

    lines.into_iter().flatten().map(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        std::str::from_utf8(line).map_err(|_| line)
    })
}

fn validate_source(source: &str) -> Result<(), LinkfetchError> {
    let url = url::Url::parse(source).map_err(|_| LinkfetchError::InvalidUrl(source.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(LinkfetchError::InvalidUrl(source.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_sources_accumulate_destinations() {
        let text = "\
http://example.com/a.zip first.zip
http://example.com/b.zip b.zip
http://example.com/a.zip second.zip
http://example.com/a.zip first.zip
";
        let parsed = SourceMapping::parse(text, Path::new("/out"));

        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.mapping.len(), 2);
        assert_eq!(
            parsed.mapping.destinations("http://example.com/a.zip").unwrap(),
            &[PathBuf::from("/out/first.zip"), PathBuf::from("/out/second.zip")]
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "http://example.com/a.zip\n\nhttp://example.com/b.zip  \t b.zip  extra\nftp://example.com/c c\n";
        let parsed = SourceMapping::parse(text, Path::new("out"));

        assert_eq!(parsed.mapping.len(), 1);
        assert_eq!(
            parsed.mapping.destinations("http://example.com/b.zip").unwrap(),
            &[PathBuf::from("out/b.zip")]
        );

        let numbers: Vec<usize> = parsed.skipped.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
        assert_eq!(parsed.skipped[0].content, "http://example.com/a.zip");
    }

    #[test]
    fn test_equivalent_paths_collapse() {
        let mut mapping = SourceMapping::new();
        assert!(mapping.insert("http://example.com/x", "out/x.bin"));
        assert!(!mapping.insert("http://example.com/x", "out/./x.bin"));
        assert_eq!(mapping.destinations("http://example.com/x").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_file_reads_link_list() {
        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        tokio::fs::write(&links, "https://example.com/1 one.bin\nbroken\n")
            .await
            .unwrap();

        let parsed = SourceMapping::from_file(&links, dir.path()).await.unwrap();
        assert_eq!(parsed.mapping.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);

        let missing = SourceMapping::from_file(&dir.path().join("nope.txt"), dir.path()).await;
        assert!(matches!(missing, Err(LinkfetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        tokio::fs::write(
            &links,
            b"http://example.com/a a.bin\nhttp://example.com/b caf\xE9.bin\r\nhttp://example.com/c c.bin\r\n",
        )
        .await
        .unwrap();

        let parsed = SourceMapping::from_file(&links, Path::new("/out")).await.unwrap();

        assert_eq!(parsed.mapping.len(), 2);
        assert_eq!(
            parsed.mapping.destinations("http://example.com/a").unwrap(),
            &[PathBuf::from("/out/a.bin")]
        );
        assert_eq!(
            parsed.mapping.destinations("http://example.com/c").unwrap(),
            &[PathBuf::from("/out/c.bin")]
        );
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line_number, 2);
        assert!(parsed.skipped[0].content.starts_with("http://example.com/b caf"));
    }

    #[tokio::test]
    async fn test_empty_file_has_no_lines() {
        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("empty.txt");
        tokio::fs::write(&links, b"").await.unwrap();

        let parsed = SourceMapping::from_file(&links, dir.path()).await.unwrap();
        assert!(parsed.mapping.is_empty());
        assert!(parsed.skipped.is_empty());
    }
}
