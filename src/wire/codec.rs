//! Binary frame encoding
//!
//! Frames follow the OSC 1.0 message layout: a padded address string, a
//! padded type-tag string starting with `,`, then big-endian payloads in
//! argument order. Every string is NUL-terminated and zero-padded to a
//! multiple of four bytes.

use nom::bytes::complete::{take, take_until};
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_f32, be_f64, be_i32};
use nom::{IResult, Parser};

use crate::core::error::{Result, TickwireError};
use crate::wire::message::{Argument, WireMessage};

/// Default capacity of a single frame (bytes)
pub const DEFAULT_MAX_FRAME: usize = 1024;

/// Frames above this size are likely to be fragmented by IP
pub const RECOMMENDED_MAX_FRAME: usize = 512;

type Input<'a> = &'a [u8];

/// Result of encoding one message
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub frame: Vec<u8>,
    /// Arguments left out because they have no wire encoding
    pub dropped: usize,
}

/// Encoder/decoder bound to a maximum frame size
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    max_frame: usize,
}

impl Codec {
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }

    pub fn max_frame(&self) -> usize {
        self.max_frame
    }

    /// Encode a message into a frame
    ///
    /// Arguments with no wire encoding (`Long`, `Blob`, and strings holding
    /// a NUL, which would end the string early) are skipped and counted in
    /// [`Encoded::dropped`], not fatal. Fails only when the resulting frame
    /// would exceed the configured maximum.
    pub fn encode(&self, message: &WireMessage) -> Result<Encoded> {
        let mut tags = vec![b','];
        let mut payload = Vec::new();
        let mut dropped = 0;

        for arg in &message.args {
            match arg {
                Argument::Int(v) => {
                    tags.push(b'i');
                    payload.extend_from_slice(&v.to_be_bytes());
                }
                Argument::Float(v) => {
                    tags.push(b'f');
                    payload.extend_from_slice(&v.to_be_bytes());
                }
                Argument::Double(v) => {
                    tags.push(b'd');
                    payload.extend_from_slice(&v.to_be_bytes());
                }
                Argument::Bool(v) => tags.push(if *v { b'T' } else { b'F' }),
                Argument::Str(s) if !s.contains('\0') => {
                    tags.push(b's');
                    write_padded(&mut payload, s.as_bytes());
                }
                other => {
                    dropped += 1;
                    tracing::debug!(
                        address = message.address(),
                        arg_type = other.type_name(),
                        "Dropping argument with no wire encoding"
                    );
                }
            }
        }

        let mut frame = Vec::with_capacity(message.address().len() + tags.len() + payload.len() + 8);
        write_padded(&mut frame, message.address().as_bytes());
        write_padded(&mut frame, &tags);
        frame.extend_from_slice(&payload);

        if frame.len() > self.max_frame {
            return Err(TickwireError::FrameTooLarge {
                size: frame.len(),
                max: self.max_frame,
            });
        }
        if frame.len() > RECOMMENDED_MAX_FRAME {
            tracing::debug!(
                address = message.address(),
                size = frame.len(),
                "Frame exceeds recommended datagram size"
            );
        }

        Ok(Encoded { frame, dropped })
    }

    /// Decode a frame into a message
    ///
    /// A frame holding only an address decodes to zero arguments.
    /// Bytes after the last payload are ignored.
    pub fn decode(&self, frame: &[u8]) -> Result<WireMessage> {
        if frame.len() > self.max_frame {
            return Err(TickwireError::MalformedFrame(format!(
                "frame of {} bytes exceeds buffer of {}",
                frame.len(),
                self.max_frame
            )));
        }

        let (rest, address) = padded_str(frame).map_err(|e| malformed("address", e))?;
        if !address.starts_with('/') {
            return Err(TickwireError::MalformedFrame(format!(
                "address {:?} does not start with '/'",
                address
            )));
        }

        let mut message = WireMessage::new(address)
            .map_err(|e| TickwireError::MalformedFrame(e.to_string()))?;
        if rest.is_empty() {
            return Ok(message);
        }

        let (mut rest, tags) = padded_str(rest).map_err(|e| malformed("type tags", e))?;
        let tags = tags.strip_prefix(',').ok_or_else(|| {
            TickwireError::MalformedFrame(format!("type tags {:?} do not start with ','", tags))
        })?;

        for tag in tags.chars() {
            let (next, arg) = match tag {
                'i' => be_i32::<_, NomError<Input>>(rest)
                    .map(|(r, v)| (r, Argument::Int(v)))
                    .map_err(|e| malformed("int32", e))?,
                'f' => be_f32::<_, NomError<Input>>(rest)
                    .map(|(r, v)| (r, Argument::Float(v)))
                    .map_err(|e| malformed("float32", e))?,
                'd' => be_f64::<_, NomError<Input>>(rest)
                    .map(|(r, v)| (r, Argument::Double(v)))
                    .map_err(|e| malformed("float64", e))?,
                'T' => (rest, Argument::Bool(true)),
                'F' => (rest, Argument::Bool(false)),
                's' => padded_str(rest)
                    .map(|(r, v)| (r, Argument::Str(v.to_string())))
                    .map_err(|e| malformed("string", e))?,
                other => {
                    return Err(TickwireError::MalformedFrame(format!(
                        "unknown type tag {:?}",
                        other
                    )))
                }
            };
            message.args.push(arg);
            rest = next;
        }

        Ok(message)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

/// Bytes taken by a string of `len` bytes once terminated and padded
fn padded_len(len: usize) -> usize {
    (len / 4 + 1) * 4
}

fn write_padded(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

fn padded_str(input: Input) -> IResult<Input, &str> {
    let (rest, raw) = take_until::<_, _, NomError<Input>>(&b"\0"[..]).parse(input)?;
    let (rest, pad) = take::<_, _, NomError<Input>>(padded_len(raw.len()) - raw.len()).parse(rest)?;
    if pad.iter().any(|b| *b != 0) {
        return Err(nom::Err::Failure(NomError::new(pad, ErrorKind::Verify)));
    }
    let text = std::str::from_utf8(raw)
        .map_err(|_| nom::Err::Failure(NomError::new(raw, ErrorKind::Char)))?;
    Ok((rest, text))
}

fn malformed(field: &str, err: nom::Err<NomError<Input>>) -> TickwireError {
    let detail = match err {
        nom::Err::Incomplete(_) => "truncated".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            ErrorKind::TakeUntil => "missing NUL terminator".to_string(),
            ErrorKind::Eof => "truncated".to_string(),
            ErrorKind::Verify => "non-zero padding".to_string(),
            ErrorKind::Char => "invalid UTF-8".to_string(),
            other => format!("{:?}", other),
        },
    };
    TickwireError::MalformedFrame(format!("{}: {}", field, detail))
}
