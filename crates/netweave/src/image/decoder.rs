use super::Error;
use super::Result;
use super::Tag;

/// Zero-copy, bounds-checked view over TLV bytes.
///
/// Container reads return new decoders restricted to the container body.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fails unless the view is exhausted.
    pub fn finish(&self) -> Result<()> {
        if self.buf.is_empty() { Ok(()) } else { Err(Error::TrailingBytes(self.buf.len())) }
    }

    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag != expected {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.consume(1)
    }

    /// Skips the next item and everything nested in it.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;
        match tag {
            Tag::BoolTrue | Tag::BoolFalse | Tag::Unit | Tag::None => Ok(()),
            Tag::U8 => self.consume(1),
            Tag::U16 => self.consume(2),
            Tag::U32 | Tag::S32 => self.consume(4),
            Tag::S64 | Tag::F64 => self.consume(8),
            Tag::String | Tag::List | Tag::Variant => {
                let len = self.read_len()?;
                self.consume(len)
            }
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => {
                self.consume(1)?;
                Ok(true)
            }
            Tag::BoolFalse => {
                self.consume(1)?;
                Ok(false)
            }
            tag => Err(Error::InvalidTag(tag as u8)),
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.check_tag(Tag::U8)?;
        Ok(self.read_array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.check_tag(Tag::U16)?;
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.check_tag(Tag::U32)?;
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn s32(&mut self) -> Result<i32> {
        self.check_tag(Tag::S32)?;
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn s64(&mut self) -> Result<i64> {
        self.check_tag(Tag::S64)?;
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.check_tag(Tag::F64)?;
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn unit(&mut self) -> Result<()> {
        self.check_tag(Tag::Unit)
    }

    /// Consumes an absent marker if one is next. Returns whether it was.
    pub fn none(&mut self) -> Result<bool> {
        if self.peek_tag()? == Tag::None {
            self.consume(1)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn str(&mut self) -> Result<&'a str> {
        self.check_tag(Tag::String)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Returns `(name, payload)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Items of a list, each as its own bounded decoder.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Decoder for the next item, `Ok(None)` at the end.
    pub fn next_item(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let mut ahead = self.dec.clone();
        ahead.skip()?;
        let len = self.dec.remaining() - ahead.remaining();
        Ok(Some(Decoder::new(self.dec.read_bytes(len)?)))
    }

    /// Decodes every item with `f`.
    pub fn collect_with<T>(mut self, mut f: impl FnMut(&mut Decoder<'a>) -> Result<T>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(mut item) = self.next_item()? {
            out.push(f(&mut item)?);
            item.finish()?;
        }
        Ok(out)
    }
}
