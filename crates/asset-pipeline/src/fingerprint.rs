use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use dess_assets::{AssetHandle, AssetType, Dependency, TargetProfile};
use sha1::{Digest, Sha1};

const STREAM_BUFFER_SIZE: usize = 64 * 1024;

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        write!(out, "{byte:02x}").expect("writing to a String cannot fail");
    }
    out
}

/// SHA-1 hex digest of a file's bytes, streamed through a 64 KiB buffer.
/// A missing or unopenable file hashes to a fixed sentinel (the digest of
/// the literal `"missing"`) rather than raising: that keeps "missing" both
/// deterministic and distinguishable from any real content.
pub fn hash_file_contents(path: &Path) -> String {
    match hash_file_contents_inner(path) {
        Ok(hash) => hash,
        Err(_) => sha1_hex(b"missing"),
    }
}

fn hash_file_contents_inner(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        write!(out, "{byte:02x}").expect("writing to a String cannot fail");
    }
    Ok(out)
}

/// Canonical JSON hash: the value is re-serialized with object keys sorted
/// so the same logical settings hash identically run to run regardless of
/// field insertion order.
pub fn hash_json(value: &serde_json::Value) -> String {
    let canonical = canonicalize(value);
    sha1_hex(canonical.to_string().as_bytes())
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Hash of only the strong dependencies, sorted by `(guid, subId, kind)` so
/// the hash does not depend on recording order. Weak dependencies never
/// participate, by design: they are observability-only and must not force a
/// re-cook of anything that depends on them transitively through this hash.
pub fn hash_dependencies(deps: &[Dependency]) -> String {
    let mut strong: Vec<&Dependency> = deps.iter().filter(|d| d.is_strong()).collect();
    strong.sort_by_key(|d| (d.asset.handle, d.asset.sub_id, d.kind_order()));
    let mut buf = String::new();
    for dep in strong {
        buf.push_str(&format!("{}:{}|", dep.asset.handle, dep.asset.sub_id));
    }
    sha1_hex(buf.as_bytes())
}

/// Hash of a fixed toolchain identity tag (e.g. `"image-decode@1|texblob@1"`).
pub fn hash_toolchain_tag(tag: &str) -> String {
    sha1_hex(tag.as_bytes())
}

/// Content hash of an arbitrary byte sequence, e.g. a DDC blob read back
/// from disk (§3: "`contentHash` is recomputed on read").
pub fn hash_bytes(bytes: &[u8]) -> String {
    sha1_hex(bytes)
}

/// Every input that feeds a DDC key, named and typed so `build_ddc_key`
/// cannot silently transpose two hash fields of the same shape.
#[derive(Debug, Clone, Copy)]
pub struct DdcKeyInput<'a> {
    pub asset_type: AssetType,
    pub guid: AssetHandle,
    pub importer_id: &'a str,
    pub importer_version: u32,
    pub target: &'a TargetProfile,
    pub settings_hash: &'a str,
    pub source_hash: &'a str,
    pub deps_hash: &'a str,
    pub toolchain_hash: &'a str,
}

/// Produces the canonical DDC key: two byte-identical inputs yield a
/// byte-identical key, and any change to any input yields a different key
/// with overwhelming probability. The key is opaque to consumers beyond
/// that contract.
pub fn build_ddc_key(input: DdcKeyInput) -> String {
    format!(
        "{}|{}|imp={}@v{}|tgt={}|S={}|C={}|D={}|T={}",
        input.asset_type.key_prefix(),
        input.guid,
        input.importer_id,
        input.importer_version,
        input.target.id(),
        input.settings_hash,
        input.source_hash,
        input.deps_hash,
        input.toolchain_hash,
    )
}

pub(crate) trait DependencyKindOrder {
    fn kind_order(&self) -> u8;
}

impl DependencyKindOrder for Dependency {
    fn kind_order(&self) -> u8 {
        match self.kind {
            dess_assets::DependencyKind::Strong => 0,
            dess_assets::DependencyKind::Weak => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dess_assets::{AssetRef, DependencyKind};

    #[test]
    fn missing_file_hashes_to_sentinel() {
        let hash = hash_file_contents(Path::new("/does/not/exist/at/all"));
        assert_eq!(hash, sha1_hex(b"missing"));
    }

    #[test]
    fn json_hash_is_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn weak_dependencies_do_not_affect_hash() {
        let strong_only = vec![Dependency::strong(AssetRef::whole(AssetHandle::new_v4()))];
        let mut with_weak = strong_only.clone();
        with_weak.push(Dependency::weak(AssetRef::whole(AssetHandle::new_v4())));
        assert_eq!(hash_dependencies(&strong_only), hash_dependencies(&strong_only));
        assert_ne!(hash_dependencies(&strong_only), hash_dependencies(&with_weak));
        // removing the weak entry again must restore the original hash
        with_weak.pop();
        assert_eq!(hash_dependencies(&strong_only), hash_dependencies(&with_weak));
        let _ = DependencyKind::Weak;
    }

    #[test]
    fn dependency_hash_ignores_recording_order() {
        let a = AssetRef::whole(AssetHandle::new_v4());
        let b = AssetRef::whole(AssetHandle::new_v4());
        let forward = vec![Dependency::strong(a), Dependency::strong(b)];
        let backward = vec![Dependency::strong(b), Dependency::strong(a)];
        assert_eq!(hash_dependencies(&forward), hash_dependencies(&backward));
    }
}
