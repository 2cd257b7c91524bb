/// Loader for Doxygen search-index data.
///
/// A Doxygen `search/` directory holds one family of files per index section
/// (`all_0.js`, `classes_b.js`, `functions_1a.js`, ...) plus `searchdata.js`,
/// which names and labels the sections. Each section file declares one array,
/// `searchData`, whose records look like:
///
/// ```text
/// ['less_2605',['less',['https://.../less.html',1,'std::less'],['https://.../ranges/less.html',1,'std::ranges::less']]]
/// ```
///
/// The record slug is the escaped, lowercased search id plus a numeric suffix.
/// Every record is normalized to an `IndexEntry` with a non-empty `targets` list.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::literal;
use crate::model::{IndexEntry, LinkTarget, Target};

/// Section assigned to records loaded without file context.
pub const DEFAULT_SECTION: &str = "all";

const SECTION_TABLE_FILE: &str = "searchdata.js";
const SEARCH_SCRIPT_FILE: &str = "search.js";

static SLUG_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_([0-9]+)$").expect("valid regex"));
static SECTION_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+)_([0-9a-f]+)\.js$").expect("valid regex"));

/// Parse raw search-data records into index entries, preserving order.
///
/// Fails on the first record that lacks a slug, a display name or a target;
/// no partial result is returned. `origin` names the source in error messages.
pub fn parse_records(
    origin: &str,
    section: &str,
    records: &[Value],
) -> Result<Vec<IndexEntry>, AppError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            parse_record(section, record).map_err(|reason| AppError::MalformedRecord {
                origin: origin.to_string(),
                record: i,
                reason,
            })
        })
        .collect()
}

fn parse_record(section: &str, record: &Value) -> Result<IndexEntry, String> {
    let fields = record.as_array().ok_or("record is not an array")?;

    let slug = fields
        .first()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or("missing sort key")?;
    let body = fields
        .get(1)
        .and_then(Value::as_array)
        .ok_or("missing symbol body")?;
    let display_name = body
        .first()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(decode_entities)
        .ok_or("missing display name")?;

    let (sort_key, ordinal) = decode_slug_for(slug, &display_name);
    if sort_key.is_empty() {
        return Err(format!("sort key of `{slug}` decodes to an empty string"));
    }

    let targets = match body.get(1) {
        // Flat form: [name, url, scope]
        Some(Value::String(url)) => {
            let scope = body.get(2).and_then(Value::as_str).unwrap_or_default();
            vec![make_target(url, scope, LinkTarget::Parent)?]
        }
        // Doxygen form: [name, [url, flag, scope], ...]
        // Pair-list form: [name, [[url, scope], [url, scope], ...]]
        Some(Value::Array(first)) => match first.first() {
            Some(Value::Array(_)) if body.len() == 2 => first.as_slice(),
            _ => &body[1..],
        }
        .iter()
        .enumerate()
        .map(|(i, t)| parse_target(t).map_err(|e| format!("target #{i}: {e}")))
        .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("targets must be a url string or target arrays".to_string()),
        None => return Err("symbol has no targets".to_string()),
    };

    Ok(IndexEntry {
        slug: slug.to_string(),
        sort_key,
        ordinal,
        display_name,
        section: section.to_string(),
        targets,
    })
}

/// `[url, flag, scope]`, `[url, scope]`, `[url, flag]` or `[url]`.
fn parse_target(value: &Value) -> Result<Target, String> {
    let parts = value.as_array().ok_or("target is not an array")?;
    let url = parts.first().and_then(Value::as_str).ok_or("missing url")?;

    let (flag, scope) = match parts.get(1) {
        Some(Value::String(scope)) => (None, Some(scope.as_str())),
        Some(flag) => (Some(flag), parts.get(2).and_then(Value::as_str)),
        None => (None, None),
    };
    let link_target = match flag {
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => LinkTarget::Blank,
        Some(Value::Bool(false)) | Some(Value::Null) => LinkTarget::Blank,
        _ => LinkTarget::Parent,
    };
    make_target(url, scope.unwrap_or_default(), link_target)
}

fn make_target(url: &str, scope: &str, link_target: LinkTarget) -> Result<Target, String> {
    if url.is_empty() {
        return Err("empty url".to_string());
    }
    Ok(Target {
        url: url.to_string(),
        scope: decode_entities(scope),
        link_target,
    })
}

/// Decode a search id into its sort key and ordinal.
///
/// `"va_5flist_2889"` becomes `("va_list", Some(2889))`: a trailing
/// `_<decimal>` is the ordinal, and every `_xx` hex pair is an escaped byte.
/// An underscore not followed by two hex digits is kept as-is.
pub fn decode_slug(slug: &str) -> (String, Option<u32>) {
    match split_ordinal(slug) {
        Some((encoded, ordinal)) => (decode_escapes(encoded), Some(ordinal)),
        None => (decode_escapes(slug), None),
    }
}

/// Like [`decode_slug`], but uses the record's display name to settle ids
/// whose last `_NN` could be either an ordinal or an escape. `operator_28_29`
/// named `operator()` has no ordinal.
pub fn decode_slug_for(slug: &str, display_name: &str) -> (String, Option<u32>) {
    let (stripped, ordinal) = decode_slug(slug);
    if ordinal.is_some() && !stripped.eq_ignore_ascii_case(display_name) {
        let whole = decode_escapes(slug);
        if whole.eq_ignore_ascii_case(display_name) {
            return (whole, None);
        }
    }
    (stripped, ordinal)
}

fn split_ordinal(slug: &str) -> Option<(&str, u32)> {
    let caps = SLUG_ORDINAL_RE.captures(slug)?;
    let ordinal = caps[2].parse::<u32>().ok()?;
    Some((caps.get(1)?.as_str(), ordinal))
}

fn decode_escapes(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' && i + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Decode the HTML entities Doxygen writes into names and scopes.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Section name of a search-data file, e.g. `classes_b.js` → `classes`.
///
/// `None` for the section table, the search script, and anything else.
pub fn section_of(file_name: &str) -> Option<String> {
    SECTION_FILE_RE
        .captures(file_name)
        .map(|caps| caps[1].to_string())
}

/// Read section labels (`"classes"` → `"Classes"`) from a `searchdata.js` source.
///
/// The file pairs `indexSectionNames` and `indexSectionLabels` by key. Missing
/// tables yield an empty map.
pub fn parse_section_labels(src: &str) -> Result<HashMap<String, String>, AppError> {
    let declarations = literal::parse_declarations(src)?;
    let table = |name: &str| {
        declarations
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_object())
    };

    let mut labels = HashMap::new();
    if let (Some(names), Some(section_labels)) =
        (table("indexSectionNames"), table("indexSectionLabels"))
    {
        for (key, name) in names {
            let (Some(name), Some(label)) = (
                name.as_str(),
                section_labels.get(key).and_then(Value::as_str),
            ) else {
                continue;
            };
            labels.insert(name.to_string(), decode_entities(label));
        }
    }
    Ok(labels)
}

/// Default label for a section without one in `searchdata.js`.
pub fn default_label(section: &str) -> String {
    let mut chars = section.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One search-data file belonging to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFile {
    pub path: PathBuf,
    pub section: String,
    /// Hex suffix of the file name (`classes_1a.js` → 26).
    pub part: u32,
}

/// The files that make up one index, in load order.
#[derive(Debug, Clone, Default)]
pub struct SearchDataFiles {
    pub sections: Vec<SectionFile>,
    pub section_table: Option<PathBuf>,
}

impl SearchDataFiles {
    /// Every file whose contents affect the index, in load order.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.sections
            .iter()
            .map(|f| f.path.as_path())
            .chain(self.section_table.as_deref())
    }
}

/// Entries and section labels read from disk.
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    pub entries: Vec<IndexEntry>,
    pub labels: HashMap<String, String>,
}

/// Find the search-data files under `path`.
///
/// `path` is either a Doxygen `search/` directory or one section file. With
/// `sections` set only those sections are kept; otherwise every section except
/// `all` is kept (it repeats the others), unless `all` is all there is.
pub fn discover(path: &Path, sections: Option<&[String]>) -> Result<SearchDataFiles, AppError> {
    if path.is_file() {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let section = section_of(file_name).unwrap_or_else(|| DEFAULT_SECTION.to_string());
        return Ok(SearchDataFiles {
            sections: vec![SectionFile {
                path: path.to_path_buf(),
                section,
                part: 0,
            }],
            section_table: None,
        });
    }

    let dir = std::fs::read_dir(path).map_err(|e| AppError::io(path, e))?;
    let mut found: Vec<SectionFile> = Vec::new();
    let mut section_table = None;
    for dir_entry in dir {
        let dir_entry = dir_entry.map_err(|e| AppError::io(path, e))?;
        let file_path = dir_entry.path();
        if !file_path.is_file() {
            continue;
        }
        let Some(file_name) = file_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name == SECTION_TABLE_FILE {
            section_table = Some(file_path.clone());
            continue;
        }
        if file_name == SEARCH_SCRIPT_FILE {
            continue;
        }
        let Some(caps) = SECTION_FILE_RE.captures(file_name) else {
            debug!(file = file_name, "not a search data file, skipping");
            continue;
        };
        let Ok(part) = u32::from_str_radix(&caps[2], 16) else {
            warn!(file = file_name, "search data file suffix out of range, skipping");
            continue;
        };
        found.push(SectionFile {
            section: caps[1].to_string(),
            part,
            path: file_path.clone(),
        });
    }

    let present: Vec<String> = {
        let mut names: Vec<String> = found.iter().map(|f| f.section.clone()).collect();
        names.sort();
        names.dedup();
        names
    };
    let keep = |section: &str| match sections {
        Some(wanted) => wanted.iter().any(|w| w.eq_ignore_ascii_case(section)),
        None => section != DEFAULT_SECTION || present.iter().all(|s| s == DEFAULT_SECTION),
    };
    if let Some(wanted) = sections {
        for w in wanted {
            if !present.iter().any(|p| p.eq_ignore_ascii_case(w)) {
                warn!(section = %w, dir = %path.display(), "requested section has no search data");
            }
        }
    }

    found.retain(|f| keep(&f.section));
    found.sort_by(|a, b| a.section.cmp(&b.section).then(a.part.cmp(&b.part)));

    if found.is_empty() {
        return Err(AppError::Config(format!(
            "no Doxygen search data files found in {}",
            path.display()
        )));
    }

    Ok(SearchDataFiles {
        sections: found,
        section_table,
    })
}

/// Parse one section file.
pub fn parse_search_file(path: &Path, section: &str) -> Result<Vec<IndexEntry>, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let records = literal::parse_search_data(&content).map_err(|e| match e {
        AppError::Parse { line, message } => AppError::Parse {
            line,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })?;
    parse_records(&path.display().to_string(), section, &records)
}

/// Load every discovered file, failing on the first bad one.
pub fn load_files(files: &SearchDataFiles) -> Result<LoadedData, AppError> {
    let mut entries = Vec::new();
    for file in &files.sections {
        let parsed = parse_search_file(&file.path, &file.section)?;
        debug!(file = %file.path.display(), entries = parsed.len(), "parsed search data file");
        entries.extend(parsed);
    }

    let labels = match &files.section_table {
        Some(table) => {
            let content = std::fs::read_to_string(table).map_err(|e| AppError::io(table, e))?;
            parse_section_labels(&content)?
        }
        None => HashMap::new(),
    };

    info!(
        files = files.sections.len(),
        entries = entries.len(),
        labelled_sections = labels.len(),
        "search data loaded"
    );
    Ok(LoadedData { entries, labels })
}

/// Discover and load the search data under `path`.
pub fn load_path(path: &Path, sections: Option<&[String]>) -> Result<LoadedData, AppError> {
    let files = discover(path, sections)?;
    load_files(&files)
}
