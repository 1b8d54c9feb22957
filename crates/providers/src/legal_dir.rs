use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use wayfarer_agent::ports::{RetrievalFilter, RetrievedChunk, Retriever};
use wayfarer_core::EvidenceError;

const CHUNK_CHARS: usize = 900;
const CHUNK_OVERLAP: usize = 150;
const HEADER_LINES: usize = 60;
const MIN_TERM_CHARS: usize = 3;

static COUNTRY_RU_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*country_ru\s*:\s*(.+?)\s*$").expect("valid regex"));
static COUNTRY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*country\s*:\s*(.+?)\s*$").expect("valid regex"));

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    terms: BTreeSet<String>,
    source: String,
    country: String,
    country_norm: String,
}

/// In-memory lexical index over a directory of markdown legal notes, one
/// country per file. Built once at startup; retrieval never touches disk.
#[derive(Debug, Default)]
pub struct LegalDirectoryRetriever {
    chunks: Vec<IndexedChunk>,
}

impl LegalDirectoryRetriever {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        collect_markdown(dir, &mut files)
            .with_context(|| format!("failed to scan legal notes in {}", dir.display()))?;
        files.sort();

        let mut retriever = Self::default();
        for path in &files {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            retriever.add_document(&source, &text);
        }
        info!(event_name = "legal_index.loaded", files = files.len(), chunks = retriever.len());
        Ok(retriever)
    }

    pub fn add_document(&mut self, source: &str, text: &str) {
        let country = country_from_header(text).unwrap_or_else(|| country_from_file_name(source));
        let country_norm = normalize(&country);
        for piece in split_chunks(text, CHUNK_CHARS, CHUNK_OVERLAP) {
            self.chunks.push(IndexedChunk {
                terms: terms(&piece),
                text: piece,
                source: source.to_owned(),
                country: country.clone(),
                country_norm: country_norm.clone(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn search(&self, query: &str, k: usize, filter: &RetrievalFilter) -> Vec<RetrievedChunk> {
        let wanted = filter.country.as_deref().map(normalize).filter(|c| !c.is_empty());
        let query_terms = terms(query);

        let mut scored: Vec<(usize, &IndexedChunk)> = self
            .chunks
            .iter()
            .filter(|chunk| wanted.as_ref().map_or(true, |c| &chunk.country_norm == c))
            .map(|chunk| (query_terms.intersection(&chunk.terms).count(), chunk))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| RetrievedChunk {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                metadata: BTreeMap::from([
                    ("country".to_owned(), chunk.country.clone()),
                    ("score".to_owned(), score.to_string()),
                ]),
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for LegalDirectoryRetriever {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<RetrievedChunk>, EvidenceError> {
        let hits = self.search(query, k, filter);
        debug!(event_name = "legal_index.search", hits = hits.len(), country = ?filter.country);
        Ok(hits)
    }
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}

fn country_from_header(text: &str) -> Option<String> {
    let head = text.lines().take(HEADER_LINES).collect::<Vec<_>>().join("\n");
    [&*COUNTRY_RU_HEADER, &*COUNTRY_HEADER].into_iter().find_map(|pattern| {
        let value = pattern.captures(&head)?.get(1)?.as_str();
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_owned())
    })
}

/// `JP__japan__ru.md` names the country in its second part when the first
/// is a short uppercase code.
fn country_from_file_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = stem.split("__").collect();
    match parts.as_slice() {
        [code, country, ..]
            if code.chars().count() <= 3
                && code.chars().any(char::is_alphabetic)
                && code.chars().all(|c| !c.is_lowercase()) =>
        {
            (*country).to_owned()
        }
        [first, ..] => (*first).to_owned(),
        [] => String::new(),
    }
}

/// Lowercase, `ё` folded to `е`, everything but letters and digits collapsed
/// to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('ё', "е")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn terms(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split(' ')
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_owned)
        .collect()
}

/// Windows of `size` chars overlapping by `overlap`, cut at the last
/// whitespace in the back half of a window when there is one.
fn split_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(cut) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = cut;
            }
        }
        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            chunks.push(piece.trim().to_owned());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use std::fs;

    use wayfarer_agent::ports::{RetrievalFilter, Retriever};

    use super::{country_from_file_name, country_from_header, normalize, split_chunks, LegalDirectoryRetriever};

    #[test]
    fn country_prefers_the_russian_header() {
        let text = "---\ncountry: Japan\ncountry_ru: \"Япония\"\n---\nВиза нужна.";
        assert_eq!(country_from_header(text).as_deref(), Some("Япония"));
        assert_eq!(country_from_header("country: Italy\n").as_deref(), Some("Italy"));
        assert_eq!(country_from_header("# Notes\nno header"), None);
    }

    #[test]
    fn file_name_fallback_skips_country_codes() {
        assert_eq!(country_from_file_name("JP__japan__ru.md"), "japan");
        assert_eq!(country_from_file_name("italy__2025.md"), "italy");
        assert_eq!(country_from_file_name("thailand.md"), "thailand");
    }

    #[test]
    fn normalization_folds_yo_and_punctuation() {
        assert_eq!(normalize("  Кот-д’Ивуар  "), "кот д ивуар");
        assert_eq!(normalize("Объединённые Эмираты"), "объединенные эмираты");
    }

    #[test]
    fn chunks_overlap_and_cover_the_text() {
        let text = "слово ".repeat(400);
        let chunks = split_chunks(&text, 900, 150);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 900));
        assert!(split_chunks("   ", 900, 150).is_empty());
    }

    #[tokio::test]
    async fn retrieval_is_filtered_by_country() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(
            dir.path().join("JP__japan__ru.md"),
            "country_ru: Япония\nВиза для туристов оформляется в консульстве. Штрафы за курение на улице.",
        )
        .expect("write");
        fs::create_dir(dir.path().join("europe")).expect("mkdir");
        fs::write(
            dir.path().join("europe").join("italy.md"),
            "Виза шенгенская. Штрафы за купание в фонтанах.",
        )
        .expect("write");
        fs::write(dir.path().join("readme.txt"), "Виза штрафы").expect("write");

        let retriever = LegalDirectoryRetriever::load(dir.path()).expect("index");
        assert_eq!(retriever.len(), 2);

        let filter = RetrievalFilter { country: Some("япония".to_owned()) };
        let hits = retriever.retrieve("Япония визы штрафы", 10, &filter).await.expect("hits");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "JP__japan__ru.md");
        assert_eq!(hits[0].metadata["country"], "Япония");

        let everywhere = retriever
            .retrieve("штрафы", 10, &RetrievalFilter::default())
            .await
            .expect("hits");
        assert_eq!(everywhere.len(), 2);

        let unknown = RetrievalFilter { country: Some("Peru".to_owned()) };
        assert!(retriever.retrieve("штрафы", 10, &unknown).await.expect("ok").is_empty());
    }
}
