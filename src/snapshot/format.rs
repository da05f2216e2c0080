//! Snapshot binary format, version 1.
//!
//! All integers are big-endian. Strings and payloads are prefixed with a
//! `u32` byte length.
//!
//! ```text
//! header   magic "CFSN" | version u16 | flags u16 | exported_at u64 | tenant_count u32
//! tenant   id str | tier u8 | storage_used u64 | created_at u64
//!          | has_key u8 [public_key 32B] | entry_count u32
//! entry    key str | type_tag u8 | entry_flags u8 | created_at u64
//!          [expires_at u64] | payload (u32 length + bytes)
//! trailer  xxhash64 u64 over every preceding byte
//! ```
//!
//! Payloads by type tag: int `i64`, float IEEE-754 bits `u64`, bool `u8`,
//! str UTF-8, list `u32` count then per item `tag u8 | payload`, dict `u32`
//! count then per item `key str | tag u8 | payload`, binary
//! `content_type str | has_filename u8 [filename str] | data bytes`.
//!
//! Salts are never written; imported registrations get a fresh salt.

use crate::core::error::{CofferError, CofferResult};
use crate::core::time::Timestamp;
use crate::store::entry::{Entry, EntryFlags};
use crate::store::tenant::PUBLIC_KEY_LEN;
use crate::store::tier::SubscriptionTier;
use crate::store::value::{Blob, TypedValue, ValueType};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Leading magic bytes.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"CFSN";

/// Format version written by this build.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Seed of the trailer checksum.
const CHECKSUM_SEED: u64 = 0x434f_4646_4552;

pub use crate::store::value::MAX_NESTING;

bitflags::bitflags! {
    /// Snapshot header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SnapshotFlags: u16 {
        /// Snapshot captures a single tenant.
        const SCOPED = 0b0000_0001;
    }
}

/// Decoded snapshot contents.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotImage {
    pub version: u16,
    pub flags: SnapshotFlags,
    pub exported_at: Timestamp,
    pub tenants: Vec<TenantImage>,
}

impl SnapshotImage {
    /// Check if the snapshot captures a single tenant.
    pub fn is_scoped(&self) -> bool {
        self.flags.contains(SnapshotFlags::SCOPED)
    }

    /// Find a tenant by id.
    pub fn tenant(&self, tenant_id: &str) -> Option<&TenantImage> {
        self.tenants.iter().find(|t| t.tenant_id == tenant_id)
    }
}

/// One tenant's captured state.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantImage {
    pub tenant_id: String,
    pub tier: SubscriptionTier,
    /// Usage at export time. Informational only; import recomputes usage.
    pub storage_used: u64,
    pub created_at: Timestamp,
    pub public_key: Option<[u8; PUBLIC_KEY_LEN]>,
    pub entries: Vec<(String, Entry)>,
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a snapshot image.
pub fn encode(image: &SnapshotImage) -> CofferResult<Bytes> {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_slice(SNAPSHOT_MAGIC);
    buf.put_u16(image.version);
    buf.put_u16(image.flags.bits());
    buf.put_u64(image.exported_at.ms);
    put_len(&mut buf, image.tenants.len())?;

    for tenant in &image.tenants {
        put_str(&mut buf, &tenant.tenant_id)?;
        buf.put_u8(tenant.tier.tag());
        buf.put_u64(tenant.storage_used);
        buf.put_u64(tenant.created_at.ms);
        match &tenant.public_key {
            Some(key) => {
                buf.put_u8(1);
                buf.put_slice(key);
            }
            None => buf.put_u8(0),
        }
        put_len(&mut buf, tenant.entries.len())?;
        for (key, entry) in &tenant.entries {
            encode_entry(&mut buf, key, entry)?;
        }
    }

    let mut hasher = XxHash64::with_seed(CHECKSUM_SEED);
    hasher.write(&buf);
    buf.put_u64(hasher.finish());
    Ok(buf.freeze())
}

fn encode_entry(buf: &mut BytesMut, key: &str, entry: &Entry) -> CofferResult<()> {
    put_str(buf, key)?;
    buf.put_u8(entry.value_type().tag());
    buf.put_u8(entry.flags().bits());
    buf.put_u64(entry.created_at.ms);
    if let Some(expires_at) = entry.expires_at {
        buf.put_u64(expires_at.ms);
    }
    encode_payload(buf, &entry.value, 0)
}

fn encode_payload(buf: &mut BytesMut, value: &TypedValue, depth: usize) -> CofferResult<()> {
    if depth > MAX_NESTING {
        return Err(CofferError::snapshot_format("value nesting too deep"));
    }
    let mut payload = BytesMut::new();
    match value {
        TypedValue::Int(i) => payload.put_i64(*i),
        TypedValue::Float(f) => payload.put_u64(f.to_bits()),
        TypedValue::Bool(b) => payload.put_u8(u8::from(*b)),
        TypedValue::Str(s) => payload.put_slice(s.as_bytes()),
        TypedValue::List(items) => {
            put_len(&mut payload, items.len())?;
            for item in items {
                payload.put_u8(item.value_type().tag());
                encode_payload(&mut payload, item, depth + 1)?;
            }
        }
        TypedValue::Dict(map) => {
            put_len(&mut payload, map.len())?;
            for (key, item) in map {
                put_str(&mut payload, key)?;
                payload.put_u8(item.value_type().tag());
                encode_payload(&mut payload, item, depth + 1)?;
            }
        }
        TypedValue::Blob(blob) => {
            put_str(&mut payload, &blob.content_type)?;
            match &blob.filename {
                Some(name) => {
                    payload.put_u8(1);
                    put_str(&mut payload, name)?;
                }
                None => payload.put_u8(0),
            }
            payload.put_slice(&blob.data);
        }
    }
    put_bytes(buf, &payload)
}

fn put_len(buf: &mut BytesMut, len: usize) -> CofferResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| CofferError::snapshot_format(format!("length {} exceeds u32", len)))?;
    buf.put_u32(len);
    Ok(())
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> CofferResult<()> {
    put_len(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

fn put_str(buf: &mut BytesMut, s: &str) -> CofferResult<()> {
    put_bytes(buf, s.as_bytes())
}

// ============================================================================
// Decoding
// ============================================================================

/// Bounds-checked big-endian reader.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CofferResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(CofferError::snapshot_format(format!(
                "truncated at offset {}: need {} bytes, {} left",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> CofferResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> CofferResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CofferResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> CofferResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> CofferResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> CofferResult<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn bytes(&mut self) -> CofferResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> CofferResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| CofferError::snapshot_format("string is not valid UTF-8"))
    }

    /// Element count, rejected when it cannot fit in the remaining bytes.
    fn count(&mut self, min_item_size: usize) -> CofferResult<usize> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_item_size) > self.remaining() {
            return Err(CofferError::snapshot_format(format!(
                "count {} exceeds remaining payload",
                count
            )));
        }
        Ok(count)
    }

    fn finish(&self) -> CofferResult<()> {
        if self.remaining() != 0 {
            return Err(CofferError::snapshot_format(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Decode and validate snapshot bytes.
pub fn decode(bytes: &[u8]) -> CofferResult<SnapshotImage> {
    if bytes.len() < SNAPSHOT_MAGIC.len() + 2 + 2 + 8 + 4 + 8 {
        return Err(CofferError::snapshot_format("snapshot too short"));
    }
    if &bytes[..4] != SNAPSHOT_MAGIC {
        return Err(CofferError::snapshot_format("bad magic"));
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(CofferError::snapshot_format(format!(
            "unsupported snapshot version {}",
            version
        )));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - 8);
    let mut hasher = XxHash64::with_seed(CHECKSUM_SEED);
    hasher.write(body);
    let mut expected = [0u8; 8];
    expected.copy_from_slice(trailer);
    if hasher.finish() != u64::from_be_bytes(expected) {
        return Err(CofferError::snapshot_format("checksum mismatch"));
    }

    let mut reader = Reader::new(body);
    reader.take(4)?;
    reader.u16()?;
    let flags = SnapshotFlags::from_bits(reader.u16()?)
        .ok_or_else(|| CofferError::snapshot_format("unknown header flags"))?;
    let exported_at = Timestamp::from_millis(reader.u64()?);
    let tenant_count = reader.count(4 + 1 + 8 + 8 + 1 + 4)?;

    let mut tenants = Vec::with_capacity(tenant_count);
    for _ in 0..tenant_count {
        tenants.push(decode_tenant(&mut reader)?);
    }
    reader.finish()?;

    if flags.contains(SnapshotFlags::SCOPED) && tenants.len() != 1 {
        return Err(CofferError::snapshot_format(
            "scoped snapshot must hold exactly one tenant",
        ));
    }

    Ok(SnapshotImage {
        version,
        flags,
        exported_at,
        tenants,
    })
}

fn decode_tenant(reader: &mut Reader<'_>) -> CofferResult<TenantImage> {
    let tenant_id = reader.string()?;
    if tenant_id.is_empty() {
        return Err(CofferError::snapshot_format("empty tenant id"));
    }
    let tier_tag = reader.u8()?;
    let tier = SubscriptionTier::from_tag(tier_tag)
        .ok_or_else(|| CofferError::snapshot_format(format!("unknown tier tag {}", tier_tag)))?;
    let storage_used = reader.u64()?;
    let created_at = Timestamp::from_millis(reader.u64()?);
    let public_key = match reader.u8()? {
        0 => None,
        1 => Some(reader.array::<PUBLIC_KEY_LEN>()?),
        other => {
            return Err(CofferError::snapshot_format(format!(
                "bad public key marker {}",
                other
            )))
        }
    };

    let entry_count = reader.count(4 + 1 + 1 + 8 + 4)?;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        entries.push(decode_entry(reader)?);
    }

    Ok(TenantImage {
        tenant_id,
        tier,
        storage_used,
        created_at,
        public_key,
        entries,
    })
}

fn decode_entry(reader: &mut Reader<'_>) -> CofferResult<(String, Entry)> {
    let key = reader.string()?;
    if key.is_empty() {
        return Err(CofferError::snapshot_format("empty entry key"));
    }
    let value_type = decode_tag(reader.u8()?)?;
    let flags = EntryFlags::from_bits(reader.u8()?)
        .ok_or_else(|| CofferError::snapshot_format("unknown entry flags"))?;
    let created_at = Timestamp::from_millis(reader.u64()?);
    let expires_at = if flags.contains(EntryFlags::HAS_EXPIRY) {
        Some(Timestamp::from_millis(reader.u64()?))
    } else {
        None
    };
    let value = decode_payload(reader, value_type, 0)?;
    Ok((
        key,
        Entry {
            value,
            created_at,
            expires_at,
        },
    ))
}

fn decode_tag(tag: u8) -> CofferResult<ValueType> {
    ValueType::from_tag(tag)
        .ok_or_else(|| CofferError::snapshot_format(format!("unknown type tag {}", tag)))
}

fn decode_payload(
    reader: &mut Reader<'_>,
    value_type: ValueType,
    depth: usize,
) -> CofferResult<TypedValue> {
    if depth > MAX_NESTING {
        return Err(CofferError::snapshot_format("value nesting too deep"));
    }
    let mut payload = Reader::new(reader.bytes()?);
    let value = match value_type {
        ValueType::Int => TypedValue::Int(payload.i64()?),
        ValueType::Float => TypedValue::Float(f64::from_bits(payload.u64()?)),
        ValueType::Bool => match payload.u8()? {
            0 => TypedValue::Bool(false),
            1 => TypedValue::Bool(true),
            other => {
                return Err(CofferError::snapshot_format(format!(
                    "bad bool byte {}",
                    other
                )))
            }
        },
        ValueType::Str => {
            let raw = payload.take(payload.remaining())?;
            TypedValue::Str(
                String::from_utf8(raw.to_vec())
                    .map_err(|_| CofferError::snapshot_format("string is not valid UTF-8"))?,
            )
        }
        ValueType::List => {
            let count = payload.count(1 + 4)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let tag = decode_tag(payload.u8()?)?;
                items.push(decode_payload(&mut payload, tag, depth + 1)?);
            }
            TypedValue::List(items)
        }
        ValueType::Dict => {
            let count = payload.count(4 + 1 + 4)?;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = payload.string()?;
                let tag = decode_tag(payload.u8()?)?;
                map.insert(key, decode_payload(&mut payload, tag, depth + 1)?);
            }
            TypedValue::Dict(map)
        }
        ValueType::Binary => {
            let content_type = payload.string()?;
            let filename = match payload.u8()? {
                0 => None,
                1 => Some(payload.string()?),
                other => {
                    return Err(CofferError::snapshot_format(format!(
                        "bad filename marker {}",
                        other
                    )))
                }
            };
            let data = Bytes::copy_from_slice(payload.take(payload.remaining())?);
            TypedValue::Blob(Blob {
                data,
                content_type,
                filename,
            })
        }
    };
    payload.finish()?;
    Ok(value)
}
