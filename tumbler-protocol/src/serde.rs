//! Utilities for serializing and deserializing `k256` key material with Serde.
//!
//! To Serde, [`SerializeKey`] looks like a "module" usable with the
//! `#[serde(with = "SerializeKey")]` syntax, adding serialization and
//! deserialization to foreign key types which do not provide implementations
//! themselves. Verifying keys travel as SEC1 compressed points, signatures as
//! their fixed 64-byte encoding, and signing keys as raw scalars (signing keys
//! only ever appear in a server's own persisted session snapshot, never in a
//! protocol message).

use ::serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use std::marker::PhantomData;

#[derive(Serialize)]
#[serde(transparent)]
struct SerWrapper<'a, K: SerializeKey>(
    #[serde(serialize_with = "<K as SerializeKey>::serialize")] &'a K,
);

#[derive(Deserialize)]
#[serde(transparent)]
struct DeWrapper<K: SerializeKey>(#[serde(with = "SerializeKey")] K);

/// Serialization/deserialization functionality for external `k256` types.
pub trait SerializeKey: Sized {
    /// Proxy serialization function telling serde how to serialize the implementing type.
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    /// Proxy deserialization function telling serde how to deserialize the implementing type.
    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;
}

impl SerializeKey for VerifyingKey {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_encoded_point(true).as_bytes().to_vec().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|_| de::Error::custom("invalid SEC1 key encoding"))
    }
}

impl SerializeKey for Signature {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_bytes().to_vec().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Signature::from_slice(&bytes).map_err(|_| de::Error::custom("invalid signature encoding"))
    }
}

impl SerializeKey for SigningKey {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_bytes().to_vec().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        SigningKey::from_slice(&bytes)
            .map_err(|_| de::Error::custom("invalid signing key encoding"))
    }
}

impl<K: SerializeKey> SerializeKey for Option<K> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match this {
            Some(key) => serializer.serialize_some(&SerWrapper(key)),
            None => serializer.serialize_none(),
        }
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<DeWrapper<K>>::deserialize(deserializer)?.map(|wrapped| wrapped.0))
    }
}

impl<K: SerializeKey> SerializeKey for Vec<K> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(this.len()))?;
        for key in this {
            seq.serialize_element(&SerWrapper(key))?;
        }
        seq.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor<K> {
            _phantom: PhantomData<K>,
        }

        impl<'de, K> Visitor<'de> for KeyVisitor<K>
        where
            K: SerializeKey,
        {
            type Value = Vec<K>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sequence of keys")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut keys = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(key) = seq.next_element::<DeWrapper<K>>()? {
                    keys.push(key.0);
                }
                Ok(keys)
            }
        }

        let visitor = KeyVisitor {
            _phantom: PhantomData,
        };

        deserializer.deserialize_seq(visitor)
    }
}
