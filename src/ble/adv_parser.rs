//! Advertisement data (AD structure) parsing.

/// AD type: Shortened Local Name.
const AD_SHORTENED_LOCAL_NAME: u8 = 0x08;
/// AD type: Complete Local Name.
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Iterate over `(ad_type, payload)` pairs, stopping at the first
/// malformed length.
fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        if i >= data.len() {
            return None;
        }
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, payload))
    })
}

/// Extract the advertised local name.
///
/// A Complete Local Name wins over a Shortened one. Names that are not
/// valid UTF-8 are treated as absent.
pub fn local_name(data: &[u8]) -> Option<&str> {
    let mut shortened = None;
    for (ad_type, payload) in ad_structures(data) {
        match ad_type {
            AD_COMPLETE_LOCAL_NAME => return core::str::from_utf8(payload).ok(),
            AD_SHORTENED_LOCAL_NAME if shortened.is_none() => shortened = Some(payload),
            _ => {}
        }
    }
    shortened.and_then(|p| core::str::from_utf8(p).ok())
}

/// True when the advertised name is exactly `target`.
pub fn advertises_name(data: &[u8], target: &str) -> bool {
    local_name(data) == Some(target)
}
