//! Content chunker: splits oversized post bodies into numbered fragments
//! and reassembles them.
//!
//! The backing platform enforces a hard maximum body size per post. A body
//! that does not fit is split into chunks, each posted separately, linked by
//! a shared group id in a one-line envelope header. Reassembly is strict:
//! any missing, duplicated, or relabeled chunk is a [`FormatError`], never a
//! silently wrong string.
//!
//! Sizing is double-accounted. Fragments are cut against
//! `max_post_bytes - margin`, then every *rendered* chunk (header included)
//! is re-measured against the true `max_post_bytes` limit before it is
//! allowed out of this module.

use uuid::Uuid;

use crate::error::FormatError;

/// Envelope header prefix. A post body starting with this is a chunk.
const CHUNK_HEADER_PREFIX: &str = "<!-- scribe:chunk ";
const CHUNK_HEADER_SUFFIX: &str = " -->\n";

/// Platform size limit plus the safety buffer reserved for the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Hard maximum body size per post, in bytes.
    pub max_post_bytes: usize,
    /// Bytes reserved for the chunk header and delimiters.
    pub margin: usize,
}

impl ChunkLimits {
    pub fn new(max_post_bytes: usize, margin: usize) -> Self {
        Self {
            max_post_bytes,
            margin,
        }
    }

    /// Maximum fragment size: the hard limit minus the envelope reserve.
    pub fn split_limit(&self) -> usize {
        self.max_post_bytes.saturating_sub(self.margin)
    }
}

impl Default for ChunkLimits {
    /// GitHub's documented 65536-char comment ceiling, with a reserve that
    /// covers the longest possible header line.
    fn default() -> Self {
        Self {
            max_post_bytes: 65_536,
            margin: 256,
        }
    }
}

/// One numbered fragment of a larger post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Shared by every chunk of one logical body.
    pub group: Uuid,
    /// Zero-based position within the group.
    pub index: u32,
    /// Declared group size.
    pub total: u32,
    pub text: String,
}

impl Chunk {
    /// Render this chunk into a post body: header line, then the fragment.
    pub fn render(&self) -> String {
        format!(
            "{}{} {}/{}{}{}",
            CHUNK_HEADER_PREFIX,
            self.group,
            self.index + 1,
            self.total,
            CHUNK_HEADER_SUFFIX,
            self.text
        )
    }

    /// Parse a post body as a chunk.
    ///
    /// Returns `Ok(None)` for bodies without the envelope header (unchunked
    /// posts), and [`FormatError::MalformedChunkHeader`] for bodies that
    /// carry the header but cannot be decoded.
    pub fn parse(body: &str) -> Result<Option<Self>, FormatError> {
        let Some(rest) = body.strip_prefix(CHUNK_HEADER_PREFIX) else {
            return Ok(None);
        };
        let malformed = || FormatError::MalformedChunkHeader {
            line: body.lines().next().unwrap_or_default().to_owned(),
        };

        let (header, text) = rest.split_once(CHUNK_HEADER_SUFFIX).ok_or_else(malformed)?;
        let (group_str, position) = header.split_once(' ').ok_or_else(malformed)?;
        let group = group_str.parse::<Uuid>().map_err(|_| malformed())?;
        let (index_str, total_str) = position.split_once('/').ok_or_else(malformed)?;
        let index_1 = index_str.parse::<u32>().map_err(|_| malformed())?;
        let total = total_str.parse::<u32>().map_err(|_| malformed())?;
        if index_1 == 0 || total == 0 || index_1 > total {
            return Err(malformed());
        }

        Ok(Some(Self {
            group,
            index: index_1 - 1,
            total,
            text: text.to_owned(),
        }))
    }
}

/// Split `text` into an ordered chunk group.
///
/// Always envelopes, even when a single chunk suffices, so the round trip
/// is uniform. Fragments are cut at char boundaries against the split
/// limit; each rendered chunk is then re-measured against the hard limit.
pub fn chunk(group: Uuid, text: &str, limits: &ChunkLimits) -> Result<Vec<Chunk>, FormatError> {
    let fragments = split_at_char_boundaries(text, limits.split_limit());
    let total = u32::try_from(fragments.len()).unwrap_or(u32::MAX);

    let chunks: Vec<Chunk> = fragments
        .into_iter()
        .enumerate()
        .map(|(i, fragment)| Chunk {
            group,
            index: i as u32,
            total,
            text: fragment.to_owned(),
        })
        .collect();

    // The margin must absorb the header; verify against the true limit.
    for c in &chunks {
        let rendered = c.render().len();
        if rendered > limits.max_post_bytes {
            return Err(FormatError::ChunkOverflow {
                rendered,
                limit: limits.max_post_bytes,
            });
        }
    }

    Ok(chunks)
}

/// Reassemble a chunk group back into the original text.
///
/// Input order does not matter; chunks are sorted by index. Fails if the
/// set is empty, mixes groups, disagrees on totals, or is not a contiguous
/// `0..total` run.
pub fn unchunk(chunks: &[Chunk]) -> Result<String, FormatError> {
    let Some(first) = chunks.first() else {
        return Err(FormatError::EmptyChunkSet);
    };
    let group = first.group;
    let total = first.total;

    for c in chunks {
        if c.group != group {
            return Err(FormatError::ChunkGroupMismatch {
                a: group,
                b: c.group,
            });
        }
        if c.total != total {
            return Err(FormatError::ChunkTotalDisagreement {
                group,
                a: total,
                b: c.total,
            });
        }
    }

    let found = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
    if found != total {
        return Err(FormatError::ChunkCountMismatch {
            group,
            declared: total,
            found,
        });
    }

    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    for (i, c) in ordered.iter().enumerate() {
        let expected = i as u32;
        if c.index != expected {
            // With count == total, a gap implies both a missing and a
            // duplicated index; report whichever shows first.
            if i > 0 && ordered[i - 1].index == c.index {
                return Err(FormatError::ChunkDuplicate {
                    group,
                    index: c.index,
                });
            }
            return Err(FormatError::ChunkMissing {
                group,
                index: expected,
                total,
            });
        }
    }

    let mut out = String::with_capacity(ordered.iter().map(|c| c.text.len()).sum());
    for c in ordered {
        out.push_str(&c.text);
    }
    Ok(out)
}

/// Cut `text` into fragments of at most `limit` bytes, never inside a char.
///
/// Returns at least one fragment (empty input yields one empty fragment).
fn split_at_char_boundaries(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(4); // widest UTF-8 char; guards a degenerate limit
    let mut fragments = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        fragments.push(head);
        rest = tail;
    }
    fragments.push(rest);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max: usize, margin: usize) -> ChunkLimits {
        ChunkLimits::new(max, margin)
    }

    #[test]
    fn round_trips_short_text() {
        let group = Uuid::new_v4();
        let chunks = chunk(group, "hello world", &ChunkLimits::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(unchunk(&chunks).unwrap(), "hello world");
    }

    #[test]
    fn round_trips_multi_chunk_text() {
        let group = Uuid::new_v4();
        let text = "abcdefghij".repeat(100);
        let chunks = chunk(group, &text, &limits(400, 100)).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(unchunk(&chunks).unwrap(), text);
    }

    #[test]
    fn round_trips_empty_text() {
        let chunks = chunk(Uuid::new_v4(), "", &ChunkLimits::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(unchunk(&chunks).unwrap(), "");
    }

    #[test]
    fn exact_limit_is_one_chunk_one_over_is_two() {
        let l = limits(1000, 200);
        let at_limit = "x".repeat(l.split_limit());
        let over_limit = "x".repeat(l.split_limit() + 1);

        let chunks = chunk(Uuid::new_v4(), &at_limit, &l).unwrap();
        assert_eq!(chunks.len(), 1);

        let chunks = chunk(Uuid::new_v4(), &over_limit, &l).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn rendered_chunks_stay_under_hard_limit() {
        let l = limits(500, 100);
        let text = "y".repeat(5_000);
        let chunks = chunk(Uuid::new_v4(), &text, &l).unwrap();
        for c in &chunks {
            assert!(c.render().len() <= l.max_post_bytes);
        }
    }

    #[test]
    fn too_small_margin_is_reported_not_posted() {
        // Margin smaller than the header line itself.
        let l = limits(100, 2);
        let text = "z".repeat(400);
        let err = chunk(Uuid::new_v4(), &text, &l).unwrap_err();
        assert!(matches!(err, FormatError::ChunkOverflow { .. }));
    }

    #[test]
    fn never_splits_inside_a_char() {
        let l = limits(100, 75);
        let text = "é".repeat(100); // 2 bytes each; split limit of 25 cuts mid-char
        let chunks = chunk(Uuid::new_v4(), &text, &l).unwrap();
        assert_eq!(unchunk(&chunks).unwrap(), text);
    }

    #[test]
    fn render_parse_round_trip() {
        let c = Chunk {
            group: Uuid::new_v4(),
            index: 2,
            total: 5,
            text: "payload\nwith lines".to_owned(),
        };
        let parsed = Chunk::parse(&c.render()).unwrap().unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn plain_body_is_not_a_chunk() {
        assert!(Chunk::parse("just a comment body").unwrap().is_none());
        assert!(Chunk::parse("").unwrap().is_none());
    }

    #[test]
    fn garbled_header_is_a_format_error() {
        let body = "<!-- scribe:chunk not-a-uuid 1/2 -->\nrest";
        let err = Chunk::parse(body).unwrap_err();
        assert!(matches!(err, FormatError::MalformedChunkHeader { .. }));
    }

    #[test]
    fn zero_position_header_is_rejected() {
        let body = format!("<!-- scribe:chunk {} 0/2 -->\nrest", Uuid::new_v4());
        assert!(Chunk::parse(&body).is_err());
    }

    #[test]
    fn removing_a_chunk_is_detected() {
        let text = "abc".repeat(500);
        let mut chunks = chunk(Uuid::new_v4(), &text, &limits(300, 100)).unwrap();
        assert!(chunks.len() >= 3);
        chunks.remove(1);
        let err = unchunk(&chunks).unwrap_err();
        assert!(matches!(err, FormatError::ChunkCountMismatch { .. }));
    }

    #[test]
    fn relabeling_an_index_is_detected() {
        let text = "abc".repeat(500);
        let mut chunks = chunk(Uuid::new_v4(), &text, &limits(300, 100)).unwrap();
        assert!(chunks.len() >= 3);
        chunks[1].index = chunks[2].index;
        let err = unchunk(&chunks).unwrap_err();
        assert!(matches!(
            err,
            FormatError::ChunkDuplicate { .. } | FormatError::ChunkMissing { .. }
        ));
    }

    #[test]
    fn relabeling_the_only_chunk_is_detected() {
        let mut chunks = chunk(Uuid::new_v4(), "tiny", &ChunkLimits::default()).unwrap();
        chunks[0].index = 1;
        assert!(unchunk(&chunks).is_err());
    }

    #[test]
    fn mixed_groups_are_rejected() {
        let a = chunk(Uuid::new_v4(), "aaa", &ChunkLimits::default()).unwrap();
        let b = chunk(Uuid::new_v4(), "bbb", &ChunkLimits::default()).unwrap();
        let mixed: Vec<Chunk> = a.into_iter().chain(b).collect();
        let err = unchunk(&mixed).unwrap_err();
        assert!(matches!(err, FormatError::ChunkGroupMismatch { .. }));
    }

    #[test]
    fn disagreeing_totals_are_rejected() {
        let text = "abc".repeat(500);
        let mut chunks = chunk(Uuid::new_v4(), &text, &limits(300, 100)).unwrap();
        chunks[0].total += 1;
        let err = unchunk(&chunks).unwrap_err();
        assert!(matches!(err, FormatError::ChunkTotalDisagreement { .. }));
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = unchunk(&[]).unwrap_err();
        assert!(matches!(err, FormatError::EmptyChunkSet));
    }

    #[test]
    fn unchunk_accepts_shuffled_input() {
        let text = "0123456789".repeat(100);
        let mut chunks = chunk(Uuid::new_v4(), &text, &limits(300, 100)).unwrap();
        chunks.reverse();
        assert_eq!(unchunk(&chunks).unwrap(), text);
    }
}
