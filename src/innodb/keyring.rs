//! Percona `keyring_file` binary format reader.
//!
//! The keyring file is a sequence of length-prefixed key records followed by
//! a SHA-256 digest over everything before it. Key material is XOR-obfuscated
//! with a fixed mask known to the server. InnoDB master keys are named
//! `INNODBKey-{server_uuid}-{master_key_id}`.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::IbdError;

/// XOR obfuscation mask used by the `keyring_file` plugin.
const OBFUSCATE_KEY: &[u8] = b"*305=Ljt0*!@$Hnm(*-9-w;:";

/// A single entry from a keyring file.
#[derive(Debug, Clone)]
pub struct KeyringEntry {
    /// Key identifier (e.g. `INNODBKey-{uuid}-{id}`).
    pub key_id: String,
    /// Key type (e.g. `AES`).
    pub key_type: String,
    /// User ID associated with the key.
    pub user_id: String,
    /// De-obfuscated key bytes.
    pub key_data: Vec<u8>,
}

/// A parsed keyring file.
#[derive(Debug)]
pub struct Keyring {
    entries: Vec<KeyringEntry>,
}

impl Keyring {
    /// Load and parse a keyring file from disk.
    ///
    /// Verifies the trailing SHA-256 digest before parsing entries.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| IbdError::Io(format!("cannot read keyring {}: {}", path.display(), e)))?;

        if data.len() < 32 {
            return Err(IbdError::KeyringMalformed(
                "file smaller than its SHA-256 digest".to_string(),
            ));
        }

        let content_len = data.len() - 32;
        let content = &data[..content_len];
        let stored_hash = &data[content_len..];

        let mut hasher = Sha256::new();
        hasher.update(content);
        let computed = hasher.finalize();

        if computed.as_slice() != stored_hash {
            return Err(IbdError::KeyringMalformed(
                "SHA-256 digest mismatch".to_string(),
            ));
        }

        Ok(Keyring {
            entries: parse_entries(content)?,
        })
    }

    /// Find a key entry by its full key ID string.
    pub fn find_key(&self, key_id: &str) -> Option<&KeyringEntry> {
        self.entries.iter().find(|e| e.key_id == key_id)
    }

    /// Fetch the 32-byte InnoDB master key for `(server_uuid, master_key_id)`.
    pub fn master_key(&self, server_uuid: &str, master_key_id: u32) -> Result<&[u8], IbdError> {
        let full_id = format!("INNODBKey-{}-{}", server_uuid, master_key_id);
        let entry = self
            .find_key(&full_id)
            .ok_or_else(|| IbdError::KeyNotFound(full_id.clone()))?;
        if entry.key_data.len() != 32 {
            return Err(IbdError::KeyringMalformed(format!(
                "{} has length {}, expected 32",
                full_id,
                entry.key_data.len()
            )));
        }
        Ok(&entry.key_data)
    }

    /// Number of entries in the keyring.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the keyring contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// XOR (de-)obfuscate key data with the fixed mask. Involutive.
fn deobfuscate(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= OBFUSCATE_KEY[i % OBFUSCATE_KEY.len()];
    }
}

fn read_le_u64(data: &[u8]) -> u64 {
    u64::from_le_bytes(data[..8].try_into().unwrap())
}

/// Parse all key records from the content portion of the file.
///
/// Each record: `[pod_size][key_id_len][key_type_len][user_id_len][key_len]`
/// (five LE u64 words) followed by the four variable fields.
fn parse_entries(mut data: &[u8]) -> Result<Vec<KeyringEntry>, IbdError> {
    let mut entries = Vec::new();

    while !data.is_empty() {
        if data.len() < 40 {
            return Err(IbdError::KeyringMalformed(format!(
                "truncated record header: {} trailing bytes",
                data.len()
            )));
        }

        let pod_size = read_le_u64(&data[0..8]) as usize;
        let key_id_len = read_le_u64(&data[8..16]) as usize;
        let key_type_len = read_le_u64(&data[16..24]) as usize;
        let user_id_len = read_le_u64(&data[24..32]) as usize;
        let key_len = read_le_u64(&data[32..40]) as usize;

        let header_size = 40;
        let entry_size = header_size + key_id_len + key_type_len + user_id_len + key_len;

        if pod_size == 0 || entry_size > data.len() {
            return Err(IbdError::KeyringMalformed(format!(
                "record size {} exceeds remaining {} bytes",
                entry_size,
                data.len()
            )));
        }

        let mut offset = header_size;
        let key_id = String::from_utf8_lossy(&data[offset..offset + key_id_len]).to_string();
        offset += key_id_len;
        let key_type = String::from_utf8_lossy(&data[offset..offset + key_type_len]).to_string();
        offset += key_type_len;
        let user_id = String::from_utf8_lossy(&data[offset..offset + user_id_len]).to_string();
        offset += user_id_len;

        let mut key_data = data[offset..offset + key_len].to_vec();
        deobfuscate(&mut key_data);

        entries.push(KeyringEntry {
            key_id,
            key_type,
            user_id,
            key_data,
        });

        data = &data[entry_size..];
    }

    Ok(entries)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_deobfuscate_roundtrip() {
        let original = vec![0x41, 0x42, 0x43, 0x44];
        let mut data = original.clone();
        deobfuscate(&mut data);
        assert_ne!(data, original);
        deobfuscate(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_parse_single_entry() {
        let key_data = vec![0x01, 0x02, 0x03, 0x04];
        let entry = build_keyring_entry("test-key", "AES", "user1", &key_data);
        let file_data = build_keyring_file(&[entry]);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        let keyring = Keyring::load(tmp.path()).unwrap();
        assert_eq!(keyring.len(), 1);
        let e = keyring.find_key("test-key").unwrap();
        assert_eq!(e.key_type, "AES");
        assert_eq!(e.user_id, "user1");
        assert_eq!(e.key_data, key_data);
    }

    #[test]
    fn test_master_key_lookup() {
        let key_data = vec![0xCC; 32];
        let uuid = "12345678-1234-1234-1234-123456789abc";
        let entry = build_keyring_entry(&format!("INNODBKey-{}-1", uuid), "AES", "", &key_data);
        let file_data = build_keyring_file(&[entry]);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        let keyring = Keyring::load(tmp.path()).unwrap();
        assert_eq!(keyring.master_key(uuid, 1).unwrap(), &key_data[..]);
    }

    #[test]
    fn test_master_key_not_found() {
        let entry = build_keyring_entry("INNODBKey-uuid-1", "AES", "", &[0u8; 32]);
        let file_data = build_keyring_file(&[entry]);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        let keyring = Keyring::load(tmp.path()).unwrap();
        assert!(matches!(
            keyring.master_key("other-uuid", 1),
            Err(IbdError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_bad_digest_rejected() {
        let entry = build_keyring_entry("key", "AES", "", &[0u8; 16]);
        let mut file_data = build_keyring_file(&[entry]);
        let len = file_data.len();
        file_data[len - 1] ^= 0xFF;

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        assert!(matches!(
            Keyring::load(tmp.path()),
            Err(IbdError::KeyringMalformed(_))
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let entry = build_keyring_entry("key", "AES", "", &[0u8; 16]);
        let mut raw = entry;
        raw.truncate(30); // cut into the length headers
        let file_data = build_keyring_file(&[raw]);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        assert!(matches!(
            Keyring::load(tmp.path()),
            Err(IbdError::KeyringMalformed(_))
        ));
    }

    #[test]
    fn test_empty_keyring() {
        let file_data = build_keyring_file(&[]);
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &file_data).unwrap();

        let keyring = Keyring::load(tmp.path()).unwrap();
        assert!(keyring.is_empty());
    }
}
