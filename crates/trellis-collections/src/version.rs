use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_types::Record;

/// Content hash of a sequence as it was read.
///
/// Two reads of the same sequence produce the same token; any append,
/// update or removal in between changes it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken([u8; 32]);

impl VersionToken {
    pub fn of(members: &[Record]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"trellis-members-v1:");
        hasher.update(&(members.len() as u64).to_le_bytes());
        for member in members {
            // Map keys serialize in sorted order, so equal records hash equally.
            let bytes = serde_json::to_vec(member).unwrap_or_default();
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..6]))
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn equal_sequences_share_a_token() {
        let a = vec![rec(json!({"name": "A", "role": "lead"}))];
        let b = vec![rec(json!({"role": "lead", "name": "A"}))];
        assert_eq!(VersionToken::of(&a), VersionToken::of(&b));
    }

    #[test]
    fn any_change_moves_the_token() {
        let base = vec![rec(json!({"name": "A"})), rec(json!({"name": "B"}))];
        let reordered = vec![rec(json!({"name": "B"})), rec(json!({"name": "A"}))];
        let shorter = vec![rec(json!({"name": "A"}))];
        let t = VersionToken::of(&base);
        assert_ne!(t, VersionToken::of(&reordered));
        assert_ne!(t, VersionToken::of(&shorter));
        assert_ne!(VersionToken::of(&[]), t);
        assert_eq!(t.to_hex().len(), 64);
        assert_eq!(t.to_string().len(), 12);
    }
}
