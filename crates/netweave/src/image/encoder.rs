use super::Error;
use super::Result;
use super::Scope;
use super::Tag;

struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// Scope-tracking TLV writer. Container lengths are back-patched on close.
///
/// # Structural Invariants
///
/// 1. **Variant scopes** hold exactly one payload after the name.
/// 2. **Root scope** must be the only open scope when the bytes are taken.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_prefix(&[])
    }

    /// Starts after raw header bytes that are not part of the TLV stream.
    pub fn with_prefix(prefix: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(prefix);
        Self { buf, stack: vec![Frame { start: prefix.len(), scope: Scope::Root, count: 0 }] }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn frame(&mut self) -> Result<&mut Frame> {
        self.stack.last_mut().ok_or(Error::ScopeUnderflow)
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        let frame = self.frame()?;
        if frame.scope == Scope::Variant && frame.count >= 1 {
            return Err(Error::TooManyItems(Scope::Variant));
        }
        self.buf.push(tag as u8);
        Ok(())
    }

    fn written(&mut self) -> Result<()> {
        self.frame()?.count += 1;
        Ok(())
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.write_tag(tag)?;
        self.buf.extend_from_slice(data);
        self.written()
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.write_tag(tag)?;
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }
        let frame = self.stack.pop().ok_or(Error::ScopeUnderflow)?;
        if frame.scope != expected {
            return Err(Error::ScopeMismatch { expected, actual: frame.scope });
        }
        if frame.scope == Scope::Variant && frame.count == 0 {
            return Err(Error::EmptyVariant);
        }

        let body_len = self.buf.len() - frame.start;
        let body_len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[frame.start - 4..frame.start].copy_from_slice(&body_len.to_le_bytes());
        self.written()
    }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    pub fn u8(&mut self, v: u8) -> Result<()> {
        self.scalar(Tag::U8, &[v])
    }

    pub fn u16(&mut self, v: u16) -> Result<()> {
        self.scalar(Tag::U16, &v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> Result<()> {
        self.scalar(Tag::U32, &v.to_le_bytes())
    }

    pub fn s32(&mut self, v: i32) -> Result<()> {
        self.scalar(Tag::S32, &v.to_le_bytes())
    }

    pub fn s64(&mut self, v: i64) -> Result<()> {
        self.scalar(Tag::S64, &v.to_le_bytes())
    }

    pub fn f64(&mut self, v: f64) -> Result<()> {
        self.scalar(Tag::F64, &v.to_le_bytes())
    }

    pub fn unit(&mut self) -> Result<()> {
        self.scalar(Tag::Unit, &[])
    }

    /// An absent optional value.
    pub fn none(&mut self) -> Result<()> {
        self.scalar(Tag::None, &[])
    }

    pub fn str(&mut self, v: &str) -> Result<()> {
        let len = u32::try_from(v.len()).map_err(|_| Error::BlobTooLarge(v.len()))?;
        self.write_tag(Tag::String)?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(v.as_bytes());
        self.written()
    }

    pub fn list_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::List, Scope::List)
    }

    pub fn list_end(&mut self) -> Result<()> {
        self.end_scope(Scope::List)
    }

    /// Begins a named variant. Exactly one payload item must follow.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        self.str(name)?;
        // The name is metadata, not the payload.
        self.frame()?.count = 0;
        Ok(())
    }

    pub fn variant_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Variant)
    }

    /// A variant whose payload is unit.
    pub fn tag_only(&mut self, name: &str) -> Result<()> {
        self.variant_begin(name)?;
        self.unit()?;
        self.variant_end()
    }
}
