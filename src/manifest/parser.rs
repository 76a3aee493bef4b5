use super::ContentHashes;

/// Tokens that must all appear on the column header line.
const HEADER_TOKENS: [&str; 3] = ["Size", "Chunks", "File SHA"];

/// Flag values marking directory/symlink metadata rows.
const EXCLUDED_FLAGS: [i64; 2] = [40, 0x40];

const HASH_LEN: usize = 40;

/// Why a data row did not contribute a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewColumns,
    BadNumber,
    ExcludedFlags,
    ZeroHash,
    ZeroSize,
    InvalidHash,
}

/// Outcome of validating a single manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Entry { hash: String, filename: String },
    Skip(SkipReason),
}

/// Result of parsing one manifest, with row accounting for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    pub hashes: ContentHashes,
    pub header_found: bool,
    pub rows_seen: usize,
    pub rows_skipped: usize,
}

/// Parses manifest text into a hash → filename map.
pub fn parse_manifest(text: &str) -> ContentHashes {
    parse_manifest_detailed(text).hashes
}

pub fn parse_manifest_detailed(text: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();
    let mut lines = text.lines();

    parsed.header_found = lines
        .by_ref()
        .any(|line| HEADER_TOKENS.iter().all(|token| line.contains(token)));
    if !parsed.header_found {
        return parsed;
    }

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        parsed.rows_seen += 1;
        match parse_row(line) {
            RowOutcome::Entry { hash, filename } => {
                parsed.hashes.insert(hash, filename);
            }
            RowOutcome::Skip(_) => parsed.rows_skipped += 1,
        }
    }
    parsed
}

/// Validates one data row: `size chunks sha flags name...`.
pub fn parse_row(line: &str) -> RowOutcome {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 {
        return RowOutcome::Skip(SkipReason::TooFewColumns);
    }
    let (Ok(size), Ok(flags)) = (tokens[0].parse::<i64>(), tokens[3].parse::<i64>()) else {
        return RowOutcome::Skip(SkipReason::BadNumber);
    };
    let hash = tokens[2];

    if EXCLUDED_FLAGS.contains(&flags) {
        return RowOutcome::Skip(SkipReason::ExcludedFlags);
    }
    if hash.len() == HASH_LEN && hash.bytes().all(|b| b == b'0') {
        return RowOutcome::Skip(SkipReason::ZeroHash);
    }
    if size == 0 {
        return RowOutcome::Skip(SkipReason::ZeroSize);
    }
    if hash.len() != HASH_LEN || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return RowOutcome::Skip(SkipReason::InvalidHash);
    }

    RowOutcome::Entry {
        hash: hash.to_ascii_lowercase(),
        filename: tokens[4..].join(" "),
    }
}
