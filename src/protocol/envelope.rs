//! Envelope types and binary codec
//!
//! Every message travels as one tagged binary envelope: a single type byte
//! followed by the fields of that message kind. All integers are big-endian;
//! strings are UTF-8 with a 16-bit length prefix.
//!
//! ```text
//! +--------+----------------------------+
//! | Tag(1) | payload (shape per tag)    |
//! +--------+----------------------------+
//!
//! string:   u16 len | bytes
//! channels: u16 channel count | per channel: u32 sample count | i32 samples
//! ```
//!
//! Decoding is strict: a truncated payload, an unknown tag, or bytes left
//! over after the declared shape all fail with [`DecodeError`], which is
//! always fatal to the connection that sent the envelope. Encoding is total
//! for well-formed in-memory values.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

// Message-type tags
const TAG_OPEN_STREAM: u8 = 0x01;
const TAG_CLOSE_STREAM: u8 = 0x02;
const TAG_WRITE_FRAME: u8 = 0x03;
const TAG_SUBSCRIBE: u8 = 0x04;
const TAG_UNSUBSCRIBE: u8 = 0x05;
const TAG_SUBSCRIBE_STREAM_LIST: u8 = 0x06;
const TAG_PUBLISH_STREAM: u8 = 0x07;
const TAG_PUBLISH_FRAME: u8 = 0x08;
const TAG_QUERY_CACHE: u8 = 0x09;
const TAG_RESULT_DONE: u8 = 0x0A;

/// Message kind carried by an [`Envelope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    OpenStream,
    CloseStream,
    WriteFrame,
    Subscribe,
    Unsubscribe,
    SubscribeStreamList,
    PublishStream,
    PublishFrame,
    QueryCache,
    ResultDone,
}

impl MessageType {
    /// Map a wire tag byte to a message type
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_OPEN_STREAM => Some(MessageType::OpenStream),
            TAG_CLOSE_STREAM => Some(MessageType::CloseStream),
            TAG_WRITE_FRAME => Some(MessageType::WriteFrame),
            TAG_SUBSCRIBE => Some(MessageType::Subscribe),
            TAG_UNSUBSCRIBE => Some(MessageType::Unsubscribe),
            TAG_SUBSCRIBE_STREAM_LIST => Some(MessageType::SubscribeStreamList),
            TAG_PUBLISH_STREAM => Some(MessageType::PublishStream),
            TAG_PUBLISH_FRAME => Some(MessageType::PublishFrame),
            TAG_QUERY_CACHE => Some(MessageType::QueryCache),
            TAG_RESULT_DONE => Some(MessageType::ResultDone),
            _ => None,
        }
    }

    /// Wire tag byte for this message type
    pub fn tag(&self) -> u8 {
        match self {
            MessageType::OpenStream => TAG_OPEN_STREAM,
            MessageType::CloseStream => TAG_CLOSE_STREAM,
            MessageType::WriteFrame => TAG_WRITE_FRAME,
            MessageType::Subscribe => TAG_SUBSCRIBE,
            MessageType::Unsubscribe => TAG_UNSUBSCRIBE,
            MessageType::SubscribeStreamList => TAG_SUBSCRIBE_STREAM_LIST,
            MessageType::PublishStream => TAG_PUBLISH_STREAM,
            MessageType::PublishFrame => TAG_PUBLISH_FRAME,
            MessageType::QueryCache => TAG_QUERY_CACHE,
            MessageType::ResultDone => TAG_RESULT_DONE,
        }
    }
}

/// Sensor category code carried in [`StreamInfo::sensor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Undefined = 0,
    Accelerometer = 1,
    Temperature = 2,
    Humidity = 3,
}

impl SensorKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SensorKind::Undefined),
            1 => Some(SensorKind::Accelerometer),
            2 => Some(SensorKind::Temperature),
            3 => Some(SensorKind::Humidity),
            _ => None,
        }
    }
}

/// Measurement unit code carried in [`StreamInfo::unit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Unknown = 0,
    /// Standard gravity (accelerometers)
    Gravity = 1,
    Celsius = 2,
    RelativeHumidity = 3,
}

impl Unit {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Unit::Unknown),
            1 => Some(Unit::Gravity),
            2 => Some(Unit::Celsius),
            3 => Some(Unit::RelativeHumidity),
            _ => None,
        }
    }
}

/// Immutable-per-open descriptor of a stream
///
/// `name` is the stream's global identity. Sensor and unit are raw code
/// bytes on the wire; [`StreamInfo::sensor_kind`] and [`StreamInfo::unit_kind`]
/// give the typed view.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Globally unique stream name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Sensor category code
    pub sensor: u8,
    /// Hardware identifier tag
    pub hardware: String,
    /// Unit code
    pub unit: u8,
    /// Per-channel descriptions (one per channel)
    pub channel_descriptions: Vec<String>,
    /// Number of channels
    pub channels: u16,
    /// Sample frequency in Hz
    pub frequency: u32,
    /// Bit depth of a sample, 1..=32
    pub bits: u8,
    /// Per-channel zero offsets (one per channel)
    pub zero_offsets: Vec<i32>,
    /// Scale factor applied to (sample - zero offset)
    pub scale: f64,
    /// Base timestamp in microseconds
    pub timestamp: u64,
    /// Display zoom hint
    pub zoom: f64,
}

impl StreamInfo {
    /// Typed sensor category, if the code is known
    pub fn sensor_kind(&self) -> Option<SensorKind> {
        SensorKind::from_code(self.sensor)
    }

    /// Typed unit, if the code is known
    pub fn unit_kind(&self) -> Option<Unit> {
        Unit::from_code(self.unit)
    }

    /// Bytes per sample: 4 if bits > 16, 2 if bits > 8, else 1
    pub fn byte_depth(&self) -> usize {
        if self.bits > 16 {
            4
        } else if self.bits > 8 {
            2
        } else {
            1
        }
    }

    /// Width of one interleaved sample row: channels * byte depth
    pub fn sample_width(&self) -> usize {
        self.channels as usize * self.byte_depth()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        put_string(buf, &self.description);
        buf.put_u8(self.sensor);
        put_string(buf, &self.hardware);
        buf.put_u8(self.unit);
        buf.put_u16(self.channels);
        for desc in &self.channel_descriptions {
            put_string(buf, desc);
        }
        buf.put_u32(self.frequency);
        buf.put_u8(self.bits);
        for offset in &self.zero_offsets {
            buf.put_i32(*offset);
        }
        buf.put_f64(self.scale);
        buf.put_u64(self.timestamp);
        buf.put_f64(self.zoom);
    }

    fn decode_from(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let name = get_string(buf)?;
        let description = get_string(buf)?;
        let sensor = get_u8(buf)?;
        let hardware = get_string(buf)?;
        let unit = get_u8(buf)?;
        let channels = get_u16(buf)?;
        let mut channel_descriptions = Vec::with_capacity(channels as usize);
        for _ in 0..channels {
            channel_descriptions.push(get_string(buf)?);
        }
        let frequency = get_u32(buf)?;
        let bits = get_u8(buf)?;
        if buf.remaining() < channels as usize * 4 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut zero_offsets = Vec::with_capacity(channels as usize);
        for _ in 0..channels {
            zero_offsets.push(buf.get_i32());
        }
        let scale = get_f64(buf)?;
        let timestamp = get_u64(buf)?;
        let zoom = get_f64(buf)?;
        Ok(Self {
            name,
            description,
            sensor,
            hardware,
            unit,
            channel_descriptions,
            channels,
            frequency,
            bits,
            zero_offsets,
            scale,
            timestamp,
            zoom,
        })
    }
}

/// One message, tagged by kind
///
/// The closed sum type makes dispatch an exhaustive `match`: adding a
/// message kind is a compile-time-checked change at every dispatch site.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Producer opens (or replaces) a named stream
    OpenStream {
        alias: u32,
        password: String,
        info: StreamInfo,
    },
    /// Producer finishes writing the stream bound to `alias`
    CloseStream { alias: u32 },
    /// Producer appends one batch of samples per channel
    WriteFrame { alias: u32, channels: Vec<Vec<i32>> },
    /// Subscribe to a stream's live frames
    Subscribe { name: String },
    /// Stop receiving a stream's live frames
    Unsubscribe { name: String },
    /// Opt in to stream announcements
    SubscribeStreamList,
    /// Server -> client: stream metadata announcement
    PublishStream { info: StreamInfo },
    /// Server -> client: one frame of samples
    PublishFrame {
        name: String,
        timestamp: u64,
        offset: u64,
        channels: Vec<Vec<i32>>,
    },
    /// Request the cached recent frames of a stream
    QueryCache { name: String },
    /// Server -> client: end-of-replay sentinel
    ResultDone { name: String },
}

impl Envelope {
    /// Message kind of this envelope
    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::OpenStream { .. } => MessageType::OpenStream,
            Envelope::CloseStream { .. } => MessageType::CloseStream,
            Envelope::WriteFrame { .. } => MessageType::WriteFrame,
            Envelope::Subscribe { .. } => MessageType::Subscribe,
            Envelope::Unsubscribe { .. } => MessageType::Unsubscribe,
            Envelope::SubscribeStreamList => MessageType::SubscribeStreamList,
            Envelope::PublishStream { .. } => MessageType::PublishStream,
            Envelope::PublishFrame { .. } => MessageType::PublishFrame,
            Envelope::QueryCache { .. } => MessageType::QueryCache,
            Envelope::ResultDone { .. } => MessageType::ResultDone,
        }
    }

    /// Encode to a standalone binary envelope
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.message_type().tag());
        match self {
            Envelope::OpenStream {
                alias,
                password,
                info,
            } => {
                buf.put_u32(*alias);
                put_string(&mut buf, password);
                info.encode_into(&mut buf);
            }
            Envelope::CloseStream { alias } => {
                buf.put_u32(*alias);
            }
            Envelope::WriteFrame { alias, channels } => {
                buf.put_u32(*alias);
                put_channels(&mut buf, channels);
            }
            Envelope::Subscribe { name }
            | Envelope::Unsubscribe { name }
            | Envelope::QueryCache { name }
            | Envelope::ResultDone { name } => {
                put_string(&mut buf, name);
            }
            Envelope::SubscribeStreamList => {}
            Envelope::PublishStream { info } => {
                info.encode_into(&mut buf);
            }
            Envelope::PublishFrame {
                name,
                timestamp,
                offset,
                channels,
            } => {
                put_string(&mut buf, name);
                buf.put_u64(*timestamp);
                buf.put_u64(*offset);
                put_channels(&mut buf, channels);
            }
        }
        buf.freeze()
    }

    /// Decode one envelope from a complete message buffer
    pub fn decode(mut buf: Bytes) -> Result<Self, DecodeError> {
        if buf.is_empty() {
            return Err(DecodeError::Empty);
        }
        let tag = buf.get_u8();
        let message_type = MessageType::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
        let envelope = match message_type {
            MessageType::OpenStream => {
                let alias = get_u32(&mut buf)?;
                let password = get_string(&mut buf)?;
                let info = StreamInfo::decode_from(&mut buf)?;
                Envelope::OpenStream {
                    alias,
                    password,
                    info,
                }
            }
            MessageType::CloseStream => Envelope::CloseStream {
                alias: get_u32(&mut buf)?,
            },
            MessageType::WriteFrame => {
                let alias = get_u32(&mut buf)?;
                let channels = get_channels(&mut buf)?;
                Envelope::WriteFrame { alias, channels }
            }
            MessageType::Subscribe => Envelope::Subscribe {
                name: get_string(&mut buf)?,
            },
            MessageType::Unsubscribe => Envelope::Unsubscribe {
                name: get_string(&mut buf)?,
            },
            MessageType::SubscribeStreamList => Envelope::SubscribeStreamList,
            MessageType::PublishStream => Envelope::PublishStream {
                info: StreamInfo::decode_from(&mut buf)?,
            },
            MessageType::PublishFrame => {
                let name = get_string(&mut buf)?;
                let timestamp = get_u64(&mut buf)?;
                let offset = get_u64(&mut buf)?;
                let channels = get_channels(&mut buf)?;
                Envelope::PublishFrame {
                    name,
                    timestamp,
                    offset,
                    channels,
                }
            }
            MessageType::QueryCache => Envelope::QueryCache {
                name: get_string(&mut buf)?,
            },
            MessageType::ResultDone => Envelope::ResultDone {
                name: get_string(&mut buf)?,
            },
        };
        if buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(buf.remaining()));
        }
        Ok(envelope)
    }
}

// Wire primitives. Every read checks `remaining` first so a truncated
// buffer fails with UnexpectedEof instead of panicking.

fn get_u8(buf: &mut Bytes) -> Result<u8, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes) -> Result<u16, DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u16())
}

fn get_u32(buf: &mut Bytes) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut Bytes) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u64())
}

fn get_f64(buf: &mut Bytes) -> Result<f64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_f64())
}

fn get_string(buf: &mut Bytes) -> Result<String, DecodeError> {
    let len = get_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn get_channels(buf: &mut Bytes) -> Result<Vec<Vec<i32>>, DecodeError> {
    let count = get_u16(buf)? as usize;
    let mut channels = Vec::with_capacity(count);
    for _ in 0..count {
        let samples = get_u32(buf)? as usize;
        if buf.remaining() < samples * 4 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut channel = Vec::with_capacity(samples);
        for _ in 0..samples {
            channel.push(buf.get_i32());
        }
        channels.push(channel);
    }
    Ok(channels)
}

fn put_channels(buf: &mut BytesMut, channels: &[Vec<i32>]) {
    buf.put_u16(channels.len() as u16);
    for channel in channels {
        buf.put_u32(channel.len() as u32);
        for sample in channel {
            buf.put_i32(*sample);
        }
    }
}
