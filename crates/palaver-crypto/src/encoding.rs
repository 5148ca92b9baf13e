//! Hex serde adapters and fixed-width parsing for key material.

use crate::error::CryptoError;

/// Serialize a fixed-size byte array as a lowercase hex string.
pub(crate) mod hex_array {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(de::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| de::Error::custom(format!("expected {N} bytes, got {len}")))
    }
}

/// Serialize a variable-length byte string as hex.
pub(crate) mod hex_vec {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(de::Error::custom)
    }
}

/// Split `N` bytes off the front of `input`.
pub(crate) fn take_array<'a, const N: usize>(
    input: &mut &'a [u8],
    what: &str,
) -> Result<[u8; N], CryptoError> {
    if input.len() < N {
        return Err(CryptoError::Malformed(format!(
            "truncated {what}: need {N} bytes, have {}",
            input.len()
        )));
    }
    let remaining: &'a [u8] = *input;
    let (head, rest) = remaining.split_at(N);
    *input = rest;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_array_advances_input() {
        let data = [1u8, 2, 3, 4, 5];
        let mut cursor = &data[..];

        let head: [u8; 2] = take_array(&mut cursor, "head").unwrap();
        assert_eq!(head, [1, 2]);
        assert_eq!(cursor, &[3, 4, 5]);

        let err = take_array::<4>(&mut cursor, "tail").unwrap_err();
        assert!(matches!(err, CryptoError::Malformed(_)));
    }
}
