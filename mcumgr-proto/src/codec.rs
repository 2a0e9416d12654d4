//! CBOR map payloads.
//!
//! Every SMP payload is a single CBOR map with text keys. The rest of the
//! crate only sees [`Map`] and the two functions [`encode`] / [`decode`].

use std::collections::BTreeMap;

pub use ciborium::Value;

use crate::ProtocolError;

/// Decoded payload: text keys to CBOR values
pub type Map = BTreeMap<String, Value>;

pub fn encode(map: &Map) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    ciborium::into_writer(map, &mut buf).map_err(|e| ProtocolError::Codec(e.to_string()))?;
    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<Map, ProtocolError> {
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Codec(e.to_string()))
}

/// Status code the device puts in `rc`; absent means success.
pub fn rc(map: &Map) -> Result<i64, ProtocolError> {
    match map.get("rc") {
        None => Ok(0),
        Some(_) => int(map, "rc"),
    }
}

pub fn text(map: &Map, key: &'static str) -> Result<String, ProtocolError> {
    match map.get(key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(_) => Err(ProtocolError::InvalidField(key)),
        None => Err(ProtocolError::MissingField(key)),
    }
}

pub fn bytes(map: &Map, key: &'static str) -> Result<Vec<u8>, ProtocolError> {
    match map.get(key) {
        Some(Value::Bytes(b)) => Ok(b.clone()),
        Some(_) => Err(ProtocolError::InvalidField(key)),
        None => Err(ProtocolError::MissingField(key)),
    }
}

pub fn int(map: &Map, key: &'static str) -> Result<i64, ProtocolError> {
    match map.get(key) {
        Some(Value::Integer(i)) => {
            i64::try_from(*i).map_err(|_| ProtocolError::InvalidField(key))
        }
        Some(_) => Err(ProtocolError::InvalidField(key)),
        None => Err(ProtocolError::MissingField(key)),
    }
}

/// Devices leave out flags that are not set.
pub fn flag(map: &Map, key: &'static str) -> Result<bool, ProtocolError> {
    match map.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ProtocolError::InvalidField(key)),
        None => Ok(false),
    }
}

pub fn optional_int(map: &Map, key: &'static str) -> Result<Option<i64>, ProtocolError> {
    match map.get(key) {
        None => Ok(None),
        Some(_) => int(map, key).map(Some),
    }
}

/// Convert a nested CBOR map value into a [`Map`], skipping non-text keys.
pub fn as_map(value: &Value, key: &'static str) -> Result<Map, ProtocolError> {
    let Value::Map(entries) = value else {
        return Err(ProtocolError::InvalidField(key));
    };

    Ok(entries
        .iter()
        .filter_map(|(k, v)| match k {
            Value::Text(k) => Some((k.clone(), v.clone())),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_is_one_byte() {
        assert_eq!(encode(&Map::new()).unwrap(), vec![0xa0]);
        assert!(decode(&[0xa0]).unwrap().is_empty());
    }

    #[test]
    fn fields() {
        let mut map = Map::new();
        map.insert("d".into(), Value::Text("hello".into()));
        map.insert("off".into(), Value::Integer(330.into()));
        map.insert("sha".into(), Value::Bytes(vec![1, 2, 3]));
        map.insert("active".into(), Value::Bool(true));

        let map = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(text(&map, "d").unwrap(), "hello");
        assert_eq!(int(&map, "off").unwrap(), 330);
        assert_eq!(bytes(&map, "sha").unwrap(), vec![1, 2, 3]);
        assert!(flag(&map, "active").unwrap());
        assert!(!flag(&map, "pending").unwrap());
        assert_eq!(rc(&map).unwrap(), 0);
        assert_eq!(optional_int(&map, "len").unwrap(), None);

        assert_eq!(text(&map, "off"), Err(ProtocolError::InvalidField("off")));
        assert_eq!(bytes(&map, "data"), Err(ProtocolError::MissingField("data")));
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(decode(&[0xff, 0x00]), Err(ProtocolError::Codec(_))));
        // an array is valid CBOR but not a payload map
        assert!(matches!(decode(&[0x80]), Err(ProtocolError::Codec(_))));
    }
}
