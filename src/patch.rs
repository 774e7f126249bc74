use std::ops::Range;

/// An Error that is raised when two edits claim overlapping byte ranges.
///
/// This is an internal invariant violation: every rewrite rule is supposed to
/// claim a byte range at most once per pass. It is not recoverable by callers.
#[derive(Debug, thiserror::Error)]
#[error("conflicting edits for byte range {start}..{end}")]
pub struct RangeConflict {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug)]
struct Edit {
    start: u32,
    end: u32,
    seq: usize,
    text: String,
}

/// An append-only collection of range edits over immutable source text.
///
/// Edits are recorded as `[start, end)` byte ranges with replacement text and
/// applied in one go by [`render`](PatchBuffer::render), which walks the
/// original text substituting at the recorded ranges. The source itself is
/// never mutated, so recorded spans stay valid for the whole pass.
///
/// [`prepend`](PatchBuffer::prepend) and [`append`](PatchBuffer::append) add
/// file-level preamble/postamble text. The preamble is anchored after a
/// shebang line when the source has one.
///
/// Each non-empty byte range may be claimed by at most one edit; a second
/// claim fails with [`RangeConflict`]. Zero-width insertions may share an
/// offset and render in insertion order.
pub struct PatchBuffer<'a> {
    src: &'a str,
    edits: Vec<Edit>,
    prologue: Vec<String>,
    epilogue: Vec<String>,
    prologue_at: u32,
    seq: usize,
}

impl<'a> PatchBuffer<'a> {
    /// Creates an empty patch buffer over `src`.
    pub fn new(src: &'a str) -> Self {
        let prologue_at = if src.starts_with("#!") {
            match src.find('\n') {
                Some(nl) => (nl + 1) as u32,
                None => src.len() as u32,
            }
        } else {
            0
        };

        Self {
            src,
            edits: Vec::new(),
            prologue: Vec::new(),
            epilogue: Vec::new(),
            prologue_at,
            seq: 0,
        }
    }

    /// Replaces the byte range with `text`.
    pub fn replace(
        &mut self,
        range: Range<u32>,
        text: impl Into<String>,
    ) -> Result<(), RangeConflict> {
        self.claim(range.start, range.end)?;
        self.push(range.start, range.end, text.into());
        Ok(())
    }

    /// Inserts `text` at the given offset without consuming any source text.
    pub fn insert(&mut self, at: u32, text: impl Into<String>) -> Result<(), RangeConflict> {
        self.claim(at, at)?;
        self.push(at, at, text.into());
        Ok(())
    }

    /// Removes the byte range from the output.
    pub fn remove(&mut self, range: Range<u32>) -> Result<(), RangeConflict> {
        self.replace(range, "")
    }

    /// Adds file-level preamble text, rendered ahead of the module body.
    pub fn prepend(&mut self, text: impl Into<String>) {
        self.prologue.push(text.into());
    }

    /// Adds file-level postamble text, rendered after the module body.
    pub fn append(&mut self, text: impl Into<String>) {
        self.epilogue.push(text.into());
    }

    /// Returns the given range of the source with all recorded edits that fall
    /// entirely inside it already applied.
    ///
    /// This is a read-only view; it supports replacement text that needs to
    /// quote the outcome of earlier edits, e.g. an invalid `import.meta`
    /// assignment that gets commented out after its pieces were rewritten.
    pub fn slice(&self, range: Range<u32>) -> String {
        let mut contained: Vec<&Edit> = self
            .edits
            .iter()
            .filter(|e| e.start >= range.start && e.end <= range.end)
            .collect();
        contained.sort_by_key(|e| (e.start, e.end, e.seq));

        let mut out = String::new();
        let mut cursor = range.start as usize;
        for edit in contained {
            out.push_str(&self.src[cursor..edit.start as usize]);
            out.push_str(&edit.text);
            cursor = edit.end as usize;
        }
        out.push_str(&self.src[cursor..range.end as usize]);
        out
    }

    /// Folds every edit recorded inside `range` into a single replacement
    /// produced by `wrap`, which receives the [`slice`](PatchBuffer::slice)
    /// view of the range.
    ///
    /// Fails if an existing edit straddles the range boundary.
    pub fn absorb(
        &mut self,
        range: Range<u32>,
        wrap: impl FnOnce(&str) -> String,
    ) -> Result<(), RangeConflict> {
        let straddles = self.edits.iter().any(|e| {
            let contained = e.start >= range.start && e.end <= range.end;
            let disjoint = e.end <= range.start || e.start >= range.end;
            !contained && !disjoint
        });
        if straddles {
            return Err(RangeConflict {
                start: range.start,
                end: range.end,
            });
        }

        let inner = self.slice(range.clone());
        self.edits
            .retain(|e| !(e.start >= range.start && e.end <= range.end));
        let text = wrap(&inner);
        self.replace(range, text)
    }

    /// Renders the patched text.
    pub fn render(&self) -> String {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|e| (e.start, e.end, e.seq));

        let mut out = String::with_capacity(self.src.len() + 128);
        let mut cursor = 0usize;
        let mut prologue_emitted = self.prologue.is_empty();

        for edit in edits {
            if !prologue_emitted && edit.start >= self.prologue_at {
                out.push_str(&self.src[cursor..self.prologue_at as usize]);
                cursor = self.prologue_at as usize;
                for text in &self.prologue {
                    out.push_str(text);
                }
                prologue_emitted = true;
            }
            out.push_str(&self.src[cursor..edit.start as usize]);
            out.push_str(&edit.text);
            cursor = edit.end as usize;
        }
        if !prologue_emitted {
            out.push_str(&self.src[cursor..self.prologue_at as usize]);
            cursor = self.prologue_at as usize;
            for text in &self.prologue {
                out.push_str(text);
            }
        }
        out.push_str(&self.src[cursor..]);
        for text in &self.epilogue {
            out.push_str(text);
        }
        out
    }

    fn push(&mut self, start: u32, end: u32, text: String) {
        let seq = self.seq;
        self.seq += 1;
        self.edits.push(Edit {
            start,
            end,
            seq,
            text,
        });
    }

    fn claim(&self, start: u32, end: u32) -> Result<(), RangeConflict> {
        for e in &self.edits {
            // Half-open ranges conflict iff they truly intersect. This also
            // covers zero-width inserts, which only conflict when they land
            // strictly inside a claimed range.
            if start < e.end && e.start < end {
                return Err(RangeConflict { start, end });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_in_source_order() {
        let src = "const a = require('x');";
        let mut patch = PatchBuffer::new(src);
        patch.replace(10..22, "__mod0").unwrap();
        patch.replace(0..5, "let").unwrap();

        assert_eq!(patch.render(), "let a = __mod0;");
    }

    #[test]
    fn rejects_overlapping_claims() {
        let src = "module.exports = 1";
        let mut patch = PatchBuffer::new(src);
        patch.replace(0..14, "__exports").unwrap();

        assert!(patch.replace(7..14, "nope").is_err());
        assert!(patch.insert(7, "nope").is_err());
        // Touching at a boundary is not a conflict.
        patch.insert(14, " /* ok */").unwrap();
    }

    #[test]
    fn keeps_insertion_order_for_same_offset() {
        let src = "body";
        let mut patch = PatchBuffer::new(src);
        patch.insert(0, "first;\n").unwrap();
        patch.insert(0, "second;\n").unwrap();

        assert_eq!(patch.render(), "first;\nsecond;\nbody");
    }

    #[test]
    fn prologue_lands_after_shebang() {
        let src = "#!/usr/bin/env node\nconsole.log(1);\n";
        let mut patch = PatchBuffer::new(src);
        patch.prepend("import 'x';\n");
        patch.append("export {};\n");

        assert_eq!(
            patch.render(),
            "#!/usr/bin/env node\nimport 'x';\nconsole.log(1);\nexport {};\n"
        );
    }

    #[test]
    fn slice_reflects_recorded_edits() {
        let src = "import.meta.filename = 'foo'";
        let mut patch = PatchBuffer::new(src);
        patch.replace(0..20, "__filename").unwrap();

        assert_eq!(patch.slice(0..28), "__filename = 'foo'");
    }

    #[test]
    fn absorb_wraps_already_patched_text() {
        let src = "before\nimport.meta.filename = 'foo'\nafter";
        let mut patch = PatchBuffer::new(src);
        patch.replace(7..27, "__filename").unwrap();
        patch
            .absorb(7..35, |stmt| format!("/* {stmt} */"))
            .unwrap();

        assert_eq!(patch.render(), "before\n/* __filename = 'foo' */\nafter");
    }
}
