use std::fmt;

/// Opaque mesh peer identifier.
///
/// Peer ids are compared byte-wise (used by the handshake tie-break rule,
/// see [`mesh-handshake`]'s `HandshakeManager::on_incoming`), so this wraps
/// the raw bytes directly rather than an opaque string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        PeerId(bytes.into())
    }

    pub fn from_public_key(pk: &[u8; 32]) -> Self {
        PeerId(pk.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(&self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl From<[u8; 32]> for PeerId {
    fn from(v: [u8; 32]) -> Self {
        PeerId(v.to_vec())
    }
}

impl<'a> From<&'a str> for PeerId {
    fn from(v: &'a str) -> Self {
        PeerId(v.as_bytes().to_vec())
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> serde::Deserialize<'de> for PeerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(PeerId(bytes))
    }
}
