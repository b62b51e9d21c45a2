//! Request signing.
//!
//! The service recomputes `api_sig` from the received parameters and rejects
//! any mismatch, so the digest input must be byte-identical on both sides:
//! the shared secret followed by every `key` + `value`, keys in ascending
//! byte order. Collecting into a `BTreeMap` makes the order independent of
//! how the caller assembled the parameters.

use std::collections::BTreeMap;

/// Compute the lowercase hex MD5 signature for `params`.
///
/// Duplicate keys keep the last value, matching how the parameters are
/// later serialized into the query string.
pub fn sign<K, V, I>(shared_secret: &str, params: I) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let mut input = String::from(shared_secret);
    for (key, value) in &sorted {
        input.push_str(key);
        input.push_str(value);
    }
    format!("{:x}", md5::compute(input.as_bytes()))
}
