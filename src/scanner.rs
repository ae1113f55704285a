use bytes::{Buf, BytesMut};

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CLOSE_SENTINEL: &[u8] = b"--";
const FILENAME_PARAM: &[u8] = b"filename=";

/// accumulating more header bytes than this without seeing a blank line
/// means the part is not worth parsing; bail to body-skipping so memory
/// stays bounded no matter what the client sends
const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SeekingBoundary,
    ReadingHeaders,
    SkippingBody,
    Done,
}

/// incremental scanner that recovers the current part's filename from a
/// multipart body fed to it in arbitrary chunks.
///
/// the boundary delimiter is the only hard synchronization point; everything
/// between delimiter hits is either a header block (scanned for the
/// `Content-Disposition` filename parameter) or part content (discarded).
/// unmatched trailing bytes are carried over into the next call, so a
/// delimiter or header split across two chunks is still recognized. malformed
/// input never errors, it just leaves the filename empty.
#[derive(Debug)]
pub struct FilenameScanner {
    boundary: Vec<u8>,
    buffer: BytesMut,
    phase: Phase,
    file_name: String,
}

impl FilenameScanner {
    /// `boundary` is the full delimiter, i.e. `--` followed by the value of
    /// the content-type boundary parameter.
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.as_bytes().to_vec(),
            buffer: BytesMut::with_capacity(MAX_HEADER_BYTES),
            phase: Phase::SeekingBoundary,
            file_name: String::new(),
        }
    }

    /// filename of the part currently being received, empty until one has
    /// been seen
    pub fn current_file_name(&self) -> &str {
        &self.file_name
    }

    /// consume the next chunk of body bytes, advancing the internal state.
    /// never blocks, never fails.
    pub fn parse_next(&mut self, chunk: &[u8]) {
        if self.phase == Phase::Done {
            return;
        }

        self.buffer.extend_from_slice(chunk);

        // each step either consumes bytes or flips the phase, so this
        // terminates; a step returning false means it needs more input
        loop {
            let advanced = match self.phase {
                Phase::SeekingBoundary | Phase::SkippingBody => self.advance_to_boundary(),
                Phase::ReadingHeaders => self.advance_through_headers(),
                Phase::Done => false,
            };

            if !advanced {
                break;
            }
        }
    }

    /// scan for the next boundary delimiter. on a hit, classify the two
    /// bytes that follow: CRLF opens another part's header block, `--` is
    /// the terminal form. anything else was boundary-shaped content, skip
    /// past it and keep looking.
    fn advance_to_boundary(&mut self) -> bool {
        match twoway::find_bytes(&self.buffer, &self.boundary) {
            Some(i) => {
                let after = i + self.boundary.len();

                if self.buffer.len() < after + 2 {
                    // delimiter found right at the edge of the chunk; drop
                    // the bytes before it and wait for the classifier bytes
                    self.buffer.advance(i);
                    return false;
                }

                match &self.buffer[after..after + 2] {
                    CLOSE_SENTINEL => {
                        tracing::trace!("multipart close delimiter seen");
                        self.phase = Phase::Done;
                        self.buffer.clear();
                        false
                    }
                    CRLF => {
                        self.buffer.advance(after + 2);
                        self.phase = Phase::ReadingHeaders;
                        true
                    }
                    _ => {
                        self.buffer.advance(after);
                        true
                    }
                }
            }
            None => {
                // retain just enough of the tail to complete a delimiter
                // that straddles this chunk and the next
                let keep = self.boundary.len() + 3;
                if self.buffer.len() > keep {
                    let surplus = self.buffer.len() - keep;
                    self.buffer.advance(surplus);
                }
                false
            }
        }
    }

    /// accumulate header bytes until the blank-line terminator, then pull
    /// the filename parameter out of the Content-Disposition line.
    fn advance_through_headers(&mut self) -> bool {
        // a part with no headers at all goes straight to its content
        if self.buffer.starts_with(CRLF) {
            self.buffer.advance(CRLF.len());
            self.phase = Phase::SkippingBody;
            return true;
        }

        match twoway::find_bytes(&self.buffer, HEADER_TERMINATOR) {
            Some(i) => {
                if let Some(name) = extract_filename(&self.buffer[..i]) {
                    tracing::debug!(file_name = %name, "detected upload filename");
                    self.file_name = name;
                }
                self.buffer.advance(i + HEADER_TERMINATOR.len());
                self.phase = Phase::SkippingBody;
                true
            }
            None if self.buffer.len() > MAX_HEADER_BYTES => {
                tracing::warn!("part header block exceeds cap, skipping part");
                self.phase = Phase::SkippingBody;
                true
            }
            None => false,
        }
    }
}

/// locate `filename="..."` (or a bare `filename=value`) on the
/// Content-Disposition line of a header block. header names and the
/// parameter name match case-insensitively, the value keeps its case.
fn extract_filename(headers: &[u8]) -> Option<String> {
    let lower = headers.to_ascii_lowercase();

    let disp = twoway::find_bytes(&lower, b"content-disposition")?;
    let line_end = twoway::find_bytes(&lower[disp..], CRLF)
        .map(|i| disp + i)
        .unwrap_or(lower.len());

    let param = twoway::find_bytes(&lower[disp..line_end], FILENAME_PARAM)?;
    let value_start = disp + param + FILENAME_PARAM.len();
    let raw = &headers[value_start..line_end];

    let value = match raw.first() {
        Some(&b'"') => {
            let rest = &raw[1..];
            let close = rest.iter().position(|&b| b == b'"')?;
            &rest[..close]
        }
        _ => {
            let end = raw
                .iter()
                .position(|&b| b == b';')
                .unwrap_or(raw.len());
            &raw[..end]
        }
    };

    let name = String::from_utf8_lossy(value).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
