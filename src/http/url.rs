use crate::protocol::REQUEST_GUID_KEY;

/// Appends `params` to `base_url` as a percent-encoded query string.
///
/// `base_url` is taken verbatim, so server-supplied continuation URLs that
/// already carry their own query string pass through untouched when `params`
/// is empty.
pub(crate) fn construct_url(base_url: &str, params: &[(String, String)]) -> String {
    let guessed_length = base_url.len() + (params.len() * 20);
    let mut url = String::with_capacity(guessed_length);

    url.push_str(base_url);

    let mut prefix = if base_url.contains('?') { '&' } else { '?' };

    for (key, value) in params {
        url.push(prefix);

        encode_into(&mut url, key);
        url.push('=');
        encode_into(&mut url, value);

        prefix = '&';
    }

    url
}

/// Rewrites the `requestGuid` query parameter of `url`, dropping any previous
/// value. Called by the transport once per HTTP attempt so retries of one
/// logical request are distinguishable server-side.
pub(crate) fn replace_request_guid(url: &str, guid: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let mut out = String::with_capacity(url.len() + REQUEST_GUID_KEY.len() + 40);
    out.push_str(base);

    let mut prefix = '?';
    if let Some(query) = query {
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let key = pair.split_once('=').map(|(key, _)| key).unwrap_or(pair);
            if key == REQUEST_GUID_KEY {
                continue;
            }
            out.push(prefix);
            out.push_str(pair);
            prefix = '&';
        }
    }

    out.push(prefix);
    out.push_str(REQUEST_GUID_KEY);
    out.push('=');
    encode_into(&mut out, guid);

    out
}

fn encode_into(buffer: &mut String, input: &str) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    for b in input.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                buffer.push(*b as char);
            }
            _ => {
                buffer.push('%');
                buffer.push(HEX[(b >> 4) as usize] as char);
                buffer.push(HEX[(b & 0x0F) as usize] as char);
            }
        }
    }
}
