//! Opaque continuation token for hashtag search.
//!
//! The token is URL-safe base64 (padded) over a compact JSON object
//! `{"r": rate, "i": id, "p": peer, "h": hash}`. It carries positional state
//! only; it is minted when the platform reports more results and is never
//! stored server-side.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{domain::SearchOffset, errors::Error, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Wire {
    r: i32,
    i: i32,
    p: i64,
    h: i64,
}

pub fn encode(rate_offset: i32, id_offset: i32, peer_id: i64, peer_hash: i64) -> String {
    let wire = Wire {
        r: rate_offset,
        i: id_offset,
        p: peer_id,
        h: peer_hash,
    };
    // Serializing four integers cannot fail.
    let json = serde_json::to_vec(&wire).unwrap_or_default();
    URL_SAFE.encode(json)
}

pub fn encode_offset(offset: &SearchOffset) -> String {
    encode(offset.rate, offset.id, offset.peer_id, offset.peer_hash)
}

pub fn decode(token: &str) -> Result<SearchOffset> {
    let bytes = URL_SAFE.decode(token).map_err(|_| Error::MalformedCursor)?;
    // Only a JSON object is a product of `encode`; serde would also accept a
    // positional array for a struct.
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| Error::MalformedCursor)?;
    if !value.is_object() {
        return Err(Error::MalformedCursor);
    }
    let wire: Wire = serde_json::from_value(value).map_err(|_| Error::MalformedCursor)?;
    Ok(SearchOffset {
        rate: wire.r,
        id: wire.i,
        peer_id: wire.p,
        peer_hash: wire.h,
    })
}
